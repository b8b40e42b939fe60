use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};
use ocr::Ocr;
use plate::{PlateGrammar, digit_count, format_plate};
use tracing::debug;

use crate::candidates;

/// 清洗后文本中每个数字字符的得分加权
const DIGIT_WEIGHT: i64 = 2;

/// 一次车牌读取的最终结果
///
/// 识别失败不会抛出异常, 以 None 显式表达缺失
#[derive(Debug, Clone)]
pub struct PlateReading {
    /// 最优候选的归一化文本
    pub raw: Option<String>,
    /// 规范分组后的车牌文本
    pub formatted: Option<String>,
    /// 最优候选的调整得分, 兜底识别不参与比较时保持 -1
    pub score: i64,
}

impl PlateReading {
    /// 结果是否需要人工复核
    ///
    /// # 参数
    ///
    /// * `threshold` - 低置信度判定阈值
    pub fn is_uncertain(&self, threshold: i64) -> bool {
        self.formatted.is_none() || self.score < threshold
    }
}

/// 车牌读取器
///
/// 串联候选变体生成, OCR 识别, 归一化与格式化, 并按调整得分选出最优候选
pub struct PlateReader<'a> {
    ocr: &'a dyn Ocr,
    grammar: &'a PlateGrammar,
}

impl<'a> PlateReader<'a> {
    /// 创建车牌读取器实例
    ///
    /// # 参数
    ///
    /// * `ocr` - 文字识别器
    /// * `grammar` - 车牌文法
    pub fn new(ocr: &'a dyn Ocr, grammar: &'a PlateGrammar) -> Self {
        Self { ocr, grammar }
    }

    /// 从文件读取裁剪图并识别
    ///
    /// # 参数
    ///
    /// * `path` - 裁剪图文件路径
    pub fn read_file(&self, path: &Path) -> Result<PlateReading> {
        let crop = image::open(path)
            .with_context(|| format!("打开图像 {} 失败", path.display()))?
            .to_rgb8();
        self.read(&crop)
    }

    /// 识别一张车牌裁剪图
    ///
    /// 对每个候选变体依次识别并归一化, 调整得分 = 原始得分 + 2 x 清洗后文本数字个数,
    /// 得分严格更高才替换最优候选 (同分保留先出现者, 即候选优先级顺序);
    /// 全部变体为空时兜底识别原始彩色裁剪图, 不参与得分比较
    ///
    /// # 参数
    ///
    /// * `crop` - 车牌裁剪图 (RGB)
    pub fn read(&self, crop: &RgbImage) -> Result<PlateReading> {
        let variants = candidates::generate(crop)?;

        let mut best_text: Option<String> = None;
        let mut best_score: i64 = -1;

        for variant in &variants {
            let result = self
                .ocr
                .recognize(&DynamicImage::ImageLuma8(variant.image.clone()))?;
            if result.text.is_empty() {
                continue;
            }

            // 原始得分为识别文本长度, 只是粗糙的置信度替代, 并非真实概率
            let raw_score = result.text.chars().count() as i64;
            let cleaned = self.grammar.normalize(&result.text);
            let adjusted = raw_score + DIGIT_WEIGHT * digit_count(&cleaned) as i64;
            debug!(
                "候选 {}: '{}' -> '{}', 得分: {}",
                variant.name, result.text, cleaned, adjusted
            );

            if adjusted > best_score {
                best_score = adjusted;
                best_text = Some(cleaned);
            }
        }

        // 兜底: 所有变体均未识别出文字时直接识别原始彩色裁剪图
        if best_text.is_none() {
            let result = self.ocr.recognize(&DynamicImage::ImageRgb8(crop.clone()))?;
            if !result.text.is_empty() {
                debug!("兜底识别原始裁剪图: '{}'", result.text);
                best_text = Some(self.grammar.normalize(&result.text));
            }
        }

        // 空串不算识别成功: 归一化后为空的最优候选按无结果处理
        let best_text = best_text.filter(|text| !text.is_empty());
        let formatted = best_text.as_deref().map(format_plate);
        Ok(PlateReading {
            raw: best_text,
            formatted,
            score: best_score,
        })
    }
}
