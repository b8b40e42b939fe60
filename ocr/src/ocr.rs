use anyhow::Result;
use image::DynamicImage;

/// OCR 结果
#[derive(Debug, Clone, Default)]
pub struct OcrResult {
    pub text: String,
    pub confidence: f32,
}

impl OcrResult {
    /// 空结果, 表示未识别到任何文字
    pub fn empty() -> Self {
        Self::default()
    }

    /// 是否未识别到任何文字
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// OCR 接口
pub trait Ocr {
    /// 识别图片中的文字
    ///
    /// # 参数
    ///
    /// * `image` - 待识别的图片 (灰度或彩色)
    fn recognize(&self, image: &DynamicImage) -> Result<OcrResult>;
}
