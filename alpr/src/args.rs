use clap::Parser;
use tracing::Level;

/// 欢迎使用 ALPR (Automatic License Plate Recognition) 车牌识别助手
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// 单张车牌裁剪图路径 (与 --input-dir 互斥)
    #[arg(short, long, conflicts_with = "input_dir")]
    pub image_file: Option<String>,

    /// 批量模式: 车牌裁剪图目录
    #[arg(short = 'd', long)]
    pub input_dir: Option<String>,

    /// 批量模式结果 CSV 输出路径
    #[arg(short, long, default_value = "alpr_results.csv")]
    pub output_file: String,

    /// 识别模型文件路径 (ONNX)
    #[arg(short, long, default_value = "models/rec_en.onnx")]
    pub model_file: String,

    /// 识别字符字典路径 (每行一个字符)
    #[arg(long, default_value = "models/en_dict.txt")]
    pub dict_file: String,

    /// 车牌文法文件路径 (YAML), 缺省使用内置文法
    #[arg(short, long)]
    pub grammar_file: Option<String>,

    /// 单次识别超时时长 (单位: 毫秒)
    #[arg(long, default_value_t = 3000)]
    pub ocr_timeout: u64,

    /// 低置信度判定阈值, 得分低于该值的结果标记为需人工复核
    #[arg(long, default_value_t = 10)]
    pub uncertain_threshold: i64,

    /// 日志等级 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: Option<Level>,

    /// 日志文件路径, 缺省仅输出到控制台
    #[arg(long)]
    pub log_file: Option<String>,

    /// 追加日志到文件
    #[arg(long, default_value_t = false)]
    pub append_log: bool,
}

impl Args {
    /// 创建命令行参数解析器
    pub fn new() -> Self {
        Self::parse()
    }
}
