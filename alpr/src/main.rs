use std::path::Path;
use std::time::Duration;

use anyhow::{Result, bail};
use ocr::{OcrEngineConfig, OcrRuntime};
use plate::PlateGrammar;
use tracing::{error, info};

use crate::log::init_log;
use crate::{args::Args, batch::BatchRunner, reader::PlateReader};

mod args;
mod batch;
mod candidates;
mod error;
mod log;
mod reader;

/// 程序入口
fn application() -> Result<()> {
    let args = Args::new();

    init_log(&args)?;

    info!("欢迎使用 ALPR (Automatic License Plate Recognition) 车牌识别助手");

    if !Path::new(&args.model_file).exists() {
        bail!("识别模型文件 {} 不存在", args.model_file);
    }
    if !Path::new(&args.dict_file).exists() {
        bail!("字符字典文件 {} 不存在", args.dict_file);
    }

    // 车牌文法
    let grammar = match &args.grammar_file {
        Some(grammar_file) => {
            if !Path::new(grammar_file).exists() {
                bail!("文法文件 {} 不存在", grammar_file);
            }
            PlateGrammar::load(grammar_file)?
        }
        None => PlateGrammar::default(),
    };

    // OCR 运行时, 引擎进程内仅初始化一次, 所有识别调用共享
    let engine_config = OcrEngineConfig {
        model_path: args.model_file.clone().into(),
        dict_path: args.dict_file.clone().into(),
        intra_threads: 4,
    };
    let runtime = OcrRuntime::new(&engine_config, Duration::from_millis(args.ocr_timeout))?;

    // 车牌读取器
    let reader = PlateReader::new(&runtime, &grammar);

    if let Some(input_dir) = &args.input_dir {
        let runner = BatchRunner::new(
            &reader,
            input_dir,
            &args.output_file,
            args.uncertain_threshold,
        );
        return runner.run();
    }

    match &args.image_file {
        Some(image_file) => run_single(&reader, image_file, args.uncertain_threshold),
        None => bail!("请通过 --image-file 或 --input-dir 指定输入"),
    }
}

/// 识别单张车牌裁剪图并输出结果
///
/// # 参数
///
/// * `reader` - 车牌读取器
/// * `image_file` - 裁剪图路径
/// * `uncertain_threshold` - 低置信度判定阈值
fn run_single(reader: &PlateReader, image_file: &str, uncertain_threshold: i64) -> Result<()> {
    let reading = reader.read_file(Path::new(image_file))?;

    match &reading.formatted {
        Some(formatted) => {
            info!("识别结果: {} (得分: {})", formatted, reading.score);
            if reading.is_uncertain(uncertain_threshold) {
                info!("结果得分偏低, 建议人工复核");
            }
        }
        None => info!("OCR failed: 未能识别出车牌文字"),
    }
    Ok(())
}

fn main() {
    match application() {
        Ok(_) => info!("程序已执行完毕"),
        Err(e) => {
            error!("程序存在异常: {}", e);
            std::process::exit(1);
        }
    }
}
