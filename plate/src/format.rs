/// 可安全分段的最小车牌长度, 低于该长度原样返回
pub const MIN_SEGMENT_LEN: usize = 6;

/// 将归一化车牌文本按固定位置分为四段并以空格连接
///
/// 分段位置固定为 [0,2) 地区码, [2,4) 区号, [4,6) 序列号, [6,..) 编号,
/// 不校验任何校验位, 不增删字符
///
/// # 参数
///
/// * `text` - 归一化后的车牌文本
pub fn format_plate(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < MIN_SEGMENT_LEN {
        return text.to_string();
    }

    let state: String = chars[0..2].iter().collect();
    let district: String = chars[2..4].iter().collect();
    let series: String = chars[4..6].iter().collect();
    let number: String = chars[6..].iter().collect();
    format!("{} {} {} {}", state, district, series, number)
}
