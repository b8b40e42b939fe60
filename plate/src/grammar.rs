use std::fs;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 单字符混淆替换规则
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfusionRule {
    /// 识别结果中的易混淆字符
    pub from: char,
    /// 替换后的字符
    pub to: char,
}

/// 车牌文法
///
/// 目标车牌格式为 10 位: 字母x2 (地区码) + 数字x2 (区号) + 字母x2 (序列号) + 数字x4 (编号),
/// 长度不足时各修正规则独立跳过, 部分文本仍会被部分修复
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlateGrammar {
    /// 常见 OCR 混淆字符表, 逐字符独立替换
    ///
    /// 替换是有损的: 真实字母 O 与数字 0 在该方案下无法区分
    pub confusions: Vec<ConfusionRule>,
    /// 地区码默认字母, 位置 0/1 出现非字母时强制替换
    pub state_letters: [char; 2],
    /// 序列号位置出现数字时的占位字母
    pub series_placeholder: char,
    /// 序列号位置 '2' 的专用改写目标, 必须先于数字占位替换执行
    pub series_two_remap: char,
}

impl Default for PlateGrammar {
    fn default() -> Self {
        Self {
            confusions: vec![
                ConfusionRule { from: 'H', to: 'M' },
                ConfusionRule { from: 'O', to: '0' },
                ConfusionRule { from: 'I', to: '1' },
                ConfusionRule { from: 'Z', to: '2' },
                ConfusionRule { from: 'S', to: '5' },
                ConfusionRule { from: 'B', to: '8' },
                ConfusionRule { from: 'G', to: '6' },
            ],
            state_letters: ['M', 'H'],
            series_placeholder: 'V',
            series_two_remap: 'Z',
        }
    }
}

impl PlateGrammar {
    /// 通过文件名加载车牌文法
    ///
    /// # 参数
    ///
    /// * `grammar_file` - 文法文件名
    pub fn load(grammar_file: &str) -> Result<PlateGrammar> {
        let grammar_data = fs::read(grammar_file).context("读取文法文件失败")?;
        let grammar = serde_yaml::from_slice::<PlateGrammar>(grammar_data.as_slice())
            .context("解析文法文件失败, 请检查格式是否正确")?;
        Ok(grammar)
    }

    /// 归一化识别文本
    ///
    /// 依次执行: 大写并剔除 [A-Z0-9] 以外字符, 混淆字符表替换, 按位置的文法修正,
    /// 输出仅包含 [A-Z0-9]
    ///
    /// # 参数
    ///
    /// * `raw` - OCR 原始识别文本
    pub fn normalize(&self, raw: &str) -> String {
        let mut chars: Vec<char> = raw
            .chars()
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            .collect();

        for c in chars.iter_mut() {
            if let Some(rule) = self.confusions.iter().find(|rule| rule.from == *c) {
                *c = rule.to;
            }
        }

        // 地区码: 前两位必须为字母
        if chars.len() >= 2 {
            if !chars[0].is_ascii_alphabetic() {
                chars[0] = self.state_letters[0];
            }
            if !chars[1].is_ascii_alphabetic() {
                chars[1] = self.state_letters[1];
            }
        }

        // 区号: [2,4) 必须为数字
        if chars.len() >= 4 {
            for c in chars[2..4].iter_mut() {
                if c.is_ascii_alphabetic() {
                    *c = '0';
                }
            }
        }

        // 序列号: [4,6) 必须为字母, '2' 的专用改写必须先于通用数字替换
        if chars.len() >= 6 {
            for c in chars[4..6].iter_mut() {
                if *c == '2' {
                    *c = self.series_two_remap;
                }
            }
            for c in chars[4..6].iter_mut() {
                if c.is_ascii_digit() {
                    *c = self.series_placeholder;
                }
            }
        }

        let normalized: String = chars.into_iter().collect();
        debug!("归一化: '{}' -> '{}'", raw, normalized);
        normalized
    }
}

/// 统计文本中的数字字符个数
///
/// # 参数
///
/// * `text` - 待统计文本
pub fn digit_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_digit()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_confusion_and_position() {
        let grammar = PlateGrammar::default();

        // H->M, Z->2 逐字符替换后: M0RL12
        // 位置修正: 位 1 非字母 -> H, 区号 RL -> 00, 序列号 12 -> VZ
        assert_eq!(grammar.normalize("H0RL1Z"), "MH00VZ");
    }

    #[test]
    fn test_normalize_series_digit_fixture() {
        let grammar = PlateGrammar::default();

        // 混淆替换后: MMD2EU1884, 区号 D2 -> 02, 序列号 EU 不变
        assert_eq!(grammar.normalize("MHD2EU1884"), "MM02EU1884");
    }

    #[test]
    fn test_normalize_strips_noise() {
        let grammar = PlateGrammar::default();

        // 剔除分隔符和小写转换后: MH12AB1234, B->8 使序列号出现数字, 再被占位替换
        assert_eq!(grammar.normalize("mh-12 ab•1234"), "MM12AV1234");
    }

    #[test]
    fn test_normalize_partial_text_partial_repair() {
        let grammar = PlateGrammar::default();

        // 长度 3: 仅地区码规则生效, 区号与序列号规则跳过
        assert_eq!(grammar.normalize("1X5"), "MX5");
    }

    #[test]
    fn test_normalize_empty() {
        let grammar = PlateGrammar::default();

        assert_eq!(grammar.normalize(""), "");
        assert_eq!(grammar.normalize("~!@#"), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        let grammar = PlateGrammar::default();

        // 字符均不在混淆表定义域内的合法车牌是归一化的不动点
        let fixed_points = ["KL07CD0042", "MM02EU1884", "DL01CA1111"];
        for text in fixed_points {
            let once = grammar.normalize(text);
            assert_eq!(once, text);
            assert_eq!(grammar.normalize(&once), once);
        }
    }

    #[test]
    fn test_normalize_charset_invariant() {
        let grammar = PlateGrammar::default();

        let inputs = ["mh12ab1234", "  KA-05 ", "板 MH 12", "0O0O", "!?"];
        for input in inputs {
            let normalized = grammar.normalize(input);
            assert!(
                normalized
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
                "'{}' -> '{}'",
                input,
                normalized
            );
        }
    }

    #[test]
    fn test_normalize_series_remap_order() {
        let grammar = PlateGrammar::default();

        // 序列号中的 2 必须改写为 Z 而非占位字母 V, 其余数字才用占位字母
        assert_eq!(grammar.normalize("MM0124A9"), "MM01ZVA9");
    }

    #[test]
    fn test_grammar_from_yaml() {
        let yaml = r#"
confusions:
  - { from: "Q", to: "0" }
state_letters: ["K", "A"]
series_placeholder: "X"
series_two_remap: "Z"
"#;
        let grammar = serde_yaml::from_str::<PlateGrammar>(yaml).unwrap();

        assert_eq!(grammar.state_letters, ['K', 'A']);
        // 自定义混淆表: Q->0, 位 1 被强制为默认字母 A
        assert_eq!(grammar.normalize("AQ12"), "AA12");
    }

    #[test]
    fn test_digit_count() {
        assert_eq!(digit_count("MH12AB1234"), 6);
        assert_eq!(digit_count("ABCD"), 0);
        assert_eq!(digit_count(""), 0);
    }
}
