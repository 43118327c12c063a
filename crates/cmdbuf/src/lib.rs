// Module structure for the command-buffer forensics library.

// Input handling
pub mod parser;
pub mod integrity;
pub mod memory;

// Decoding
pub mod decode;
pub mod path;

// Analysis and output
pub mod regs;
pub mod report;
pub mod conf;
