//! Host-side GPU register map (AHB offsets), used to label register dumps.

pub const REG_CHIP_ID: u32 = 0x1C;
pub const REG_CHIP_REV: u32 = 0x20;
pub const REG_CHIP_TIME: u32 = 0x28;
pub const REG_CMD_BUFFER_ADDR: u32 = 0x40;
pub const REG_CMD_BUFFER_START: u32 = 0x4C;
pub const REG_FETCH_ADDR: u32 = 0x50;
pub const REG_MMU_STATUS: u32 = 0x504;
pub const REG_MMU_EXCEPTION: u32 = 0x508;

/// Value of the `idle` register when every module is idle.
pub const ALL_IDLE: u32 = 0x7FFF_FFFF;

/// Sorted by address: (address, name, description).
static HOST_REGISTERS: [(u32, &str, &str); 40] = [
    (0x0C, "AQIntrAcknowledge", "interrupt acknowledge"),
    (0x10, "AQIntrEnbl", "interrupt enable"),
    (0x14, "AQIdent", "chip identification"),
    (0x18, "AQFeatures", "feature bits"),
    (0x1C, "AQChipId", "chip id"),
    (0x20, "AQChipRev", "chip revision"),
    (0x24, "AQChipDate", "chip date"),
    (0x28, "AQChipTime", "chip time"),
    (0x2C, "AQChipMinorRev", "chip minor revision"),
    (0x30, "AQProductId", "product id"),
    (0x34, "AQChipMask", "chip mask"),
    (0x40, "AQCmdBufferAddr", "command buffer current read address"),
    (0x44, "AQCmdBufferCtrl", "command buffer control / end address"),
    (0x48, "AQLinkReturn", "CALL return address"),
    (0x4C, "AQCmdBufferStart", "command buffer start address"),
    (0x50, "AQFetchAddr", "current fetch address"),
    (0x54, "AQProgramCounter", "program counter"),
    (0x58, "AQDmaAddr", "DMA address"),
    (0x5C, "AQDmaConfig", "DMA configuration"),
    (0x60, "AQDmaStatus", "DMA status"),
    (0x98, "AQMemoryFeatures", "memory features"),
    (0xA4, "AQMemoryConfig", "memory configuration"),
    (0xA8, "AQMemoryDebug", "memory debug"),
    (0xE8, "AQCmdState", "command state"),
    (0x100, "AQDebugControl", "debug control"),
    (0x104, "AQDebugData", "debug data"),
    (0x108, "AQDebugAddress", "debug address"),
    (0x438, "AQDebugSignals0", "debug signals 0, GPU internal state"),
    (0x43C, "AQDebugSignals1", "debug signals 1"),
    (0x440, "AQDebugSignals2", "debug signals 2"),
    (0x444, "AQDebugSignals3", "debug signals 3"),
    (0x448, "AQModuleDebug", "module debug registers"),
    (0x450, "AQPipeDebug", "pipeline debug registers"),
    (0x454, "AQFetchDebug", "fetch debug registers"),
    (0x45C, "AQRenderDebug", "render debug registers"),
    (0x468, "AQTessDebug", "tessellation debug registers"),
    (0x46C, "AQPathDebug", "path debug registers"),
    (0x500, "AQMMUConfig", "MMU configuration"),
    (0x504, "AQMMUStatus", "MMU status"),
    (0x508, "AQMMUException", "MMU exception address"),
];

/// Named (non-address) registers printed by the driver.
static NAMED_REGISTERS: [(&str, &str); 2] = [
    ("AQHiClockControl", "clock control for the GPU modules"),
    ("idle", "0x7fffffff means every module is idle"),
];

pub fn host_register(address: u32) -> Option<(&'static str, &'static str)> {
    HOST_REGISTERS
        .binary_search_by_key(&address, |(a, _, _)| *a)
        .ok()
        .map(|i| (HOST_REGISTERS[i].1, HOST_REGISTERS[i].2))
}

pub fn named_register(name: &str) -> Option<&'static str> {
    NAMED_REGISTERS.iter().find(|(n, _)| *n == name).map(|(_, d)| *d)
}

/// Meaning of a debug-fill value, if it is one.
pub fn sentinel_meaning(value: u32) -> Option<&'static str> {
    match value {
        0xBABE_F00D => Some("uninitialized marker"),
        0x1234_5678 => Some("test/debug marker"),
        0xAAAA_AAAA => Some("fill pattern"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sorted() {
        assert!(HOST_REGISTERS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_lookups() {
        assert_eq!(host_register(0x1C).map(|r| r.0), Some("AQChipId"));
        assert_eq!(host_register(0x46C).map(|r| r.0), Some("AQPathDebug"));
        assert!(host_register(0x1D).is_none());
        assert!(named_register("idle").is_some());
        assert_eq!(sentinel_meaning(0xBABE_F00D), Some("uninitialized marker"));
        assert_eq!(sentinel_meaning(0), None);
    }
}
