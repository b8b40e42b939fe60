use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::reader::PlateReader;

/// 支持的图像扩展名
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 单张图像的批量识别记录
struct BatchRecord {
    image: String,
    raw: Option<String>,
    formatted: Option<String>,
}

/// 批量识别执行器
///
/// 遍历目录下的车牌裁剪图, 逐张识别并把结果写入 CSV (列: image, raw_text, formatted)
pub struct BatchRunner<'a> {
    reader: &'a PlateReader<'a>,
    input_dir: &'a str,
    output_file: &'a str,
    uncertain_threshold: i64,
}

impl<'a> BatchRunner<'a> {
    /// 创建批量识别执行器实例
    ///
    /// # 参数
    ///
    /// * `reader` - 车牌读取器
    /// * `input_dir` - 裁剪图目录
    /// * `output_file` - 结果 CSV 输出路径
    /// * `uncertain_threshold` - 低置信度判定阈值
    pub fn new(
        reader: &'a PlateReader<'a>,
        input_dir: &'a str,
        output_file: &'a str,
        uncertain_threshold: i64,
    ) -> Self {
        Self {
            reader,
            input_dir,
            output_file,
            uncertain_threshold,
        }
    }

    /// 执行批量识别并输出 CSV
    pub fn run(&self) -> Result<()> {
        let files = self.list_image_files()?;
        info!("目录 {} 下共找到 {} 张图像", self.input_dir, files.len());

        let mut records = Vec::new();
        let mut uncertain_count = 0u32;

        for path in &files {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            let reading = match self.reader.read_file(path) {
                Ok(reading) => reading,
                Err(e) => {
                    warn!("读取 {} 失败: {}", name, e);
                    records.push(BatchRecord {
                        image: name,
                        raw: None,
                        formatted: None,
                    });
                    continue;
                }
            };

            match &reading.formatted {
                Some(formatted) => info!("{} -> {} (得分: {})", name, formatted, reading.score),
                None => info!("{} -> OCR failed", name),
            }
            if reading.is_uncertain(self.uncertain_threshold) {
                uncertain_count += 1;
            }

            records.push(BatchRecord {
                image: name,
                raw: reading.raw,
                formatted: reading.formatted,
            });
        }

        self.write_csv(&records)?;
        info!(
            "批量识别完毕, 结果已写入 {}, 待人工复核: {}",
            self.output_file, uncertain_count
        );
        Ok(())
    }

    /// 列出目录下受支持的图像文件, 按文件名排序保证输出顺序稳定
    fn list_image_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(self.input_dir)
            .with_context(|| format!("读取目录 {} 失败", self.input_dir))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if supported {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// 写出识别结果 CSV
    fn write_csv(&self, records: &[BatchRecord]) -> Result<()> {
        let file = File::create(self.output_file)
            .with_context(|| format!("创建结果文件 {} 失败", self.output_file))?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "image,raw_text,formatted")?;
        for record in records {
            writeln!(
                writer,
                "{},{},{}",
                csv_field(&record.image),
                csv_field(record.raw.as_deref().unwrap_or("")),
                csv_field(record.formatted.as_deref().unwrap_or("")),
            )?;
        }
        Ok(())
    }
}

/// CSV 字段转义, 含分隔符或引号时加引号包裹
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_field_plain() {
        assert_eq!(csv_field("MH 12 AB 1234"), "MH 12 AB 1234");
        assert_eq!(csv_field(""), "");
    }

    #[test]
    fn test_csv_field_escaped() {
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("a\"b"), "\"a\"\"b\"");
    }
}
