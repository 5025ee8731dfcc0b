mod analyzer;
mod core;
mod mirror;

pub use analyzer::MarketAnalyzer;
pub use core::StructureEngine;
pub use mirror::MirrorEngine;
