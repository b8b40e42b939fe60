mod ocr;
mod pp_ocr;
mod runtime;

pub use ocr::{Ocr, OcrResult};
pub use pp_ocr::{OcrEngineConfig, PPOcr};
pub use runtime::OcrRuntime;
