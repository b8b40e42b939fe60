use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use image::{
    DynamicImage,
    imageops::{self, FilterType},
};
use ndarray::{Array4, ArrayView3, Axis};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use tracing::debug;

use crate::ocr::{Ocr, OcrResult};

/// 识别模型输入高度 (PaddleOCR 识别模型固定为 48)
const INPUT_HEIGHT: u32 = 48;

/// OCR 引擎配置
#[derive(Debug, Clone)]
pub struct OcrEngineConfig {
    /// 识别模型文件路径 (ONNX)
    pub model_path: PathBuf,
    /// 字符字典文件路径, 每行一个字符
    pub dict_path: PathBuf,
    /// 推理线程数
    pub intra_threads: usize,
}

/// 基于 PaddleOCR 识别模型的 OCR 实现
///
/// 仅做文字识别, 不做文字检测: 输入应当是已经裁剪好的单行文字图像
pub struct PPOcr {
    session: RefCell<Session>,
    character_dict: Vec<String>,
}

impl PPOcr {
    /// 创建 PPOcr 实例, 模型与字典从配置给出的路径加载
    ///
    /// # 参数
    ///
    /// * `config` - OCR 引擎配置
    pub fn new(config: &OcrEngineConfig) -> Result<PPOcr> {
        let character_dict: Vec<String> = fs::read_to_string(&config.dict_path)
            .with_context(|| format!("读取字符字典 {} 失败", config.dict_path.display()))?
            .lines()
            .map(String::from)
            .collect();
        if character_dict.is_empty() {
            bail!("字符字典 {} 为空", config.dict_path.display());
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(&config.model_path)
            .with_context(|| format!("加载识别模型 {} 失败", config.model_path.display()))?;

        debug!(
            "识别模型加载成功, 字典字符数: {}",
            character_dict.len()
        );

        Ok(PPOcr {
            session: RefCell::new(session),
            character_dict,
        })
    }

    /// 将图像转换为张量数组数据
    ///
    /// 高度固定缩放到模型输入高度, 宽度按比例缩放, 像素归一化到 [0,1]
    ///
    /// # 参数
    ///
    /// * `image` - 输入图像
    fn image_to_tensor(image: &DynamicImage) -> Array4<f32> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let target_height = INPUT_HEIGHT;
        let target_width =
            (((width as f32 / height as f32) * target_height as f32) as u32).max(1);

        let resized = imageops::resize(&rgb, target_width, target_height, FilterType::Triangle);
        let mut input = Array4::zeros((1, 3, target_height as usize, target_width as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            let [r, g, b] = pixel.0;

            input[[0, 0, y as usize, x as usize]] = r as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = g as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = b as f32 / 255.0;
        }
        input
    }
}

/// CTC 贪心解码
///
/// 逐帧取最大概率类别, 跳过空白类并合并连续重复类别,
/// 置信度为选中帧概率的均值
///
/// # 参数
///
/// * `dict` - 字符字典 (类别 1 对应 dict[0], 类别 0 为 CTC 空白)
/// * `shape` - 模型输出形状, 预期 [batch, seq_len, classes]
/// * `data` - 模型输出数据
fn decode_ctc(dict: &[String], shape: &[i64], data: &[f32]) -> Result<OcrResult> {
    if shape.len() != 3 {
        return Err(anyhow!("意外的模型输出形状: {:?}", shape));
    }

    let batch_size = shape[0] as usize;
    let seq_len = shape[1] as usize;
    let num_classes = shape[2] as usize;
    if data.len() != batch_size * seq_len * num_classes {
        return Err(anyhow!("意外的模型输出长度: {}", data.len()));
    }

    let preds = ArrayView3::from_shape((batch_size, seq_len, num_classes), data)
        .map_err(|e| anyhow!("转换模型输出到数组视图失败: {}", e))?;
    let preds = preds.index_axis(Axis(0), 0);

    let blank_index = 0;
    let mut text = String::new();
    let mut probs = Vec::new();
    let mut prev_index = blank_index;

    for row in preds.outer_iter() {
        let Some((index, &prob)) = row
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };

        if index != blank_index && index != prev_index {
            if let Some(character) = dict.get(index - 1) {
                text.push_str(character);
                probs.push(prob);
            }
        }
        prev_index = index;
    }

    let text = text.trim().to_string();
    if text.is_empty() {
        return Ok(OcrResult::empty());
    }

    let confidence = probs.iter().sum::<f32>() / probs.len() as f32;
    debug!("识别结果: {}, 置信度: {:.3}", text, confidence);

    Ok(OcrResult { text, confidence })
}

impl Ocr for PPOcr {
    /// 识别图像中的文本
    ///
    /// # 参数
    ///
    /// * `image` - 输入图像
    fn recognize(&self, image: &DynamicImage) -> Result<OcrResult> {
        if image.width() == 0 || image.height() == 0 {
            bail!("输入图像尺寸为空");
        }

        let tensor = PPOcr::image_to_tensor(image);
        let tensor = TensorRef::from_array_view(tensor.view())?;
        let mut session = self.session.borrow_mut();
        let outputs = session.run(ort::inputs![tensor])?;

        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        decode_ctc(&self.character_dict, shape, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn dict() -> Vec<String> {
        vec!["A".to_string(), "B".to_string(), "C".to_string()]
    }

    /// 构造一行 one-hot 概率, 最大值落在 index
    fn row(num_classes: usize, index: usize, prob: f32) -> Vec<f32> {
        let mut row = vec![(1.0 - prob) / (num_classes - 1) as f32; num_classes];
        row[index] = prob;
        row
    }

    #[test]
    fn test_decode_ctc_merges_repeats_and_blanks() {
        // 序列 [A, A, 空白, B, B, C] 解码为 ABC
        let mut data = Vec::new();
        for index in [1, 1, 0, 2, 2, 3] {
            data.extend(row(4, index, 0.9));
        }

        let result = decode_ctc(&dict(), &[1, 6, 4], &data).unwrap();
        assert_eq!(result.text, "ABC");
        assert!((result.confidence - 0.9).abs() < 1e-4);
    }

    #[test]
    fn test_decode_ctc_repeat_after_blank_kept() {
        // 空白分隔的重复字符不应被合并: [A, 空白, A] -> AA
        let mut data = Vec::new();
        for index in [1, 0, 1] {
            data.extend(row(4, index, 0.8));
        }

        let result = decode_ctc(&dict(), &[1, 3, 4], &data).unwrap();
        assert_eq!(result.text, "AA");
    }

    #[test]
    fn test_decode_ctc_all_blank() {
        let mut data = Vec::new();
        for _ in 0..4 {
            data.extend(row(4, 0, 0.99));
        }

        let result = decode_ctc(&dict(), &[1, 4, 4], &data).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_decode_ctc_bad_shape() {
        assert!(decode_ctc(&dict(), &[1, 4], &[0.0; 4]).is_err());
        assert!(decode_ctc(&dict(), &[1, 4, 4], &[0.0; 3]).is_err());
    }

    #[test]
    fn test_image_to_tensor_shape() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(96, 24, image::Rgb([255, 0, 0])));
        let tensor = PPOcr::image_to_tensor(&image);

        // 高度缩放到 48, 宽度等比缩放到 192
        assert_eq!(tensor.shape(), &[1, 3, 48, 192]);
        // 红色通道归一化为 1.0
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert_eq!(tensor[[0, 1, 0, 0]], 0.0);
    }
}
