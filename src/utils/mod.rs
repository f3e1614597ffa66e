pub mod data_path;
pub mod obfuscate;
pub mod paths;
pub mod text;
