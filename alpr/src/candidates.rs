use anyhow::Result;
use image::{
    GrayImage, Luma, RgbImage,
    imageops::{self, FilterType},
};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::filter::{bilateral_filter, gaussian_blur_f32};
use imageproc::morphology::open;
use tracing::debug;

use crate::error::AlprError;

/// 小尺寸裁剪图判定阈值 (最大边长, 单位: 像素)
const SMALL_CROP_MAX_DIM: u32 = 150;
/// 小尺寸裁剪图的放大倍率
const SMALL_CROP_SCALE: f32 = 2.5;
/// 常规裁剪图的放大倍率
const NORMAL_CROP_SCALE: f32 = 1.6;
/// 自适应阈值窗口半径 (窗口宽度 15 像素)
const ADAPTIVE_BLOCK_RADIUS: u32 = 7;
/// 自适应阈值偏置
const ADAPTIVE_BIAS: i64 = 6;

/// 候选变体: 由裁剪图经单个确定性变换得到的单通道图像
pub struct CandidateVariant {
    /// 变体名称, 用于日志与得分追踪
    pub name: &'static str,
    pub image: GrayImage,
}

/// 由裁剪图生成候选变体序列
///
/// 所有变体互相独立, 只共享灰度放大后的祖先图像;
/// 输出顺序即优先级: [resized, denoised, adaptive, morph-clean, otsu],
/// 该顺序仅作为评分器的同分决胜依据
///
/// # 参数
///
/// * `crop` - 车牌裁剪图 (RGB)
pub fn generate(crop: &RgbImage) -> Result<Vec<CandidateVariant>> {
    let (width, height) = crop.dimensions();
    if width == 0 || height == 0 {
        return Err(AlprError::EmptyCrop.into());
    }

    let gray = imageops::grayscale(crop);

    // 小图放大倍率更高, 三次插值保持笔画边缘平滑
    let scale = if width.max(height) < SMALL_CROP_MAX_DIM {
        SMALL_CROP_SCALE
    } else {
        NORMAL_CROP_SCALE
    };
    let resized = imageops::resize(
        &gray,
        (width as f32 * scale) as u32,
        (height as f32 * scale) as u32,
        FilterType::CatmullRom,
    );

    // 保边去噪
    let denoised = bilateral_filter(&resized, 9, 75.0, 75.0);

    // 局部自适应阈值, 应对光照不均
    let adaptive = adaptive_mean_threshold(&denoised, ADAPTIVE_BLOCK_RADIUS, ADAPTIVE_BIAS);

    // 高斯模糊后全局 Otsu 阈值
    let blurred = gaussian_blur_f32(&resized, 0.8);
    let otsu = threshold(&blurred, otsu_level(&blurred), ThresholdType::Binary);

    // 3x3 开运算去除细小噪点, 保留字符笔画
    let morph = open(&otsu, Norm::LInf, 1);

    debug!("候选变体生成完毕: {}x{}, 放大倍率 {}", width, height, scale);

    Ok(vec![
        CandidateVariant {
            name: "resized",
            image: resized,
        },
        CandidateVariant {
            name: "denoised",
            image: denoised,
        },
        CandidateVariant {
            name: "adaptive",
            image: adaptive,
        },
        CandidateVariant {
            name: "morph-clean",
            image: morph,
        },
        CandidateVariant {
            name: "otsu",
            image: otsu,
        },
    ])
}

/// 带偏置的均值自适应阈值
///
/// imageproc 的 adaptive_threshold 不带偏置参数, 这里基于积分图自行实现:
/// 像素值高于 (邻域均值 - bias) 时置白, 否则置黑, 窗口越界部分按实际范围取均值
fn adaptive_mean_threshold(image: &GrayImage, block_radius: u32, bias: i64) -> GrayImage {
    let (width, height) = image.dimensions();
    let w = width as usize;
    let h = height as usize;

    // 积分图, 首行首列补零
    let mut integral = vec![0u64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += image.get_pixel(x as u32, y as u32).0[0] as u64;
            integral[(y + 1) * (w + 1) + (x + 1)] = integral[y * (w + 1) + (x + 1)] + row_sum;
        }
    }

    let radius = block_radius as i64;
    let mut output = GrayImage::new(width, height);
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let x0 = (x - radius).max(0) as usize;
            let y0 = (y - radius).max(0) as usize;
            let x1 = (x + radius + 1).min(w as i64) as usize;
            let y1 = (y + radius + 1).min(h as i64) as usize;

            let sum = integral[y1 * (w + 1) + x1] + integral[y0 * (w + 1) + x0]
                - integral[y0 * (w + 1) + x1]
                - integral[y1 * (w + 1) + x0];
            let mean = sum as i64 / ((x1 - x0) * (y1 - y0)) as i64;

            let value = image.get_pixel(x as u32, y as u32).0[0] as i64;
            let binary = if value > mean - bias { 255u8 } else { 0u8 };
            output.put_pixel(x as u32, y as u32, Luma([binary]));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造一张带横向渐变的裁剪图
    fn gradient_crop(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            let value = (x * 255 / width.max(1)) as u8;
            image::Rgb([value, value, value])
        })
    }

    #[test]
    fn test_generate_order_and_count() {
        let variants = generate(&gradient_crop(60, 20)).unwrap();

        let names: Vec<&str> = variants.iter().map(|v| v.name).collect();
        assert_eq!(
            names,
            vec!["resized", "denoised", "adaptive", "morph-clean", "otsu"]
        );
    }

    #[test]
    fn test_generate_deterministic() {
        let crop = gradient_crop(40, 16);

        let first = generate(&crop).unwrap();
        let second = generate(&crop).unwrap();
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.image.as_raw(), b.image.as_raw());
        }
    }

    #[test]
    fn test_generate_scale_by_crop_size() {
        // 最大边长低于 150 像素放大 2.5 倍
        let small = generate(&gradient_crop(40, 20)).unwrap();
        assert_eq!(small[0].image.dimensions(), (100, 50));

        // 其余放大 1.6 倍
        let large = generate(&gradient_crop(200, 60)).unwrap();
        assert_eq!(large[0].image.dimensions(), (320, 96));
    }

    #[test]
    fn test_generate_empty_crop_rejected() {
        assert!(generate(&RgbImage::new(0, 0)).is_err());
        assert!(generate(&RgbImage::new(10, 0)).is_err());
    }

    #[test]
    fn test_adaptive_threshold_binary_output() {
        let image = GrayImage::from_fn(30, 10, |x, y| Luma([((x + y) % 7 * 36) as u8]));

        let binary = adaptive_mean_threshold(&image, 7, 6);
        assert!(binary.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn test_adaptive_threshold_uniform_image_white() {
        // 均匀图像上每个像素都等于邻域均值, 偏置使其全部置白
        let image = GrayImage::from_pixel(20, 8, Luma([128]));

        let binary = adaptive_mean_threshold(&image, 7, 6);
        assert!(binary.pixels().all(|p| p.0[0] == 255));
    }
}
