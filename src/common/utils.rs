/// 将人类可读的大小字符串解析为字节数，如 "1K"、"10M"、"1.5G"
pub fn human_size_to_int(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("大小字符串为空".to_string());
    }

    let (num_part, unit) = match s.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&s[..s.len() - 1], Some(c.to_ascii_uppercase())),
        _ => (s, None),
    };

    let num: f64 = num_part
        .trim()
        .parse()
        .map_err(|_| format!("无法解析大小: {}", s))?;
    if num < 0.0 {
        return Err(format!("大小不能为负数: {}", s));
    }

    let factor: u64 = match unit {
        None | Some('B') => 1,
        Some('K') => 1 << 10,
        Some('M') => 1 << 20,
        Some('G') => 1 << 30,
        Some('T') => 1 << 40,
        Some(u) => return Err(format!("未知的大小单位: {}", u)),
    };

    Ok((num * factor as f64) as u64)
}

/// 将字节数格式化为人类可读的大小字符串
pub fn human_size(size: u64) -> String {
    const UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut value = size as f64;
    let mut idx = 0;
    while value >= 1024.0 && idx < UNITS.len() - 1 {
        value /= 1024.0;
        idx += 1;
    }
    if idx == 0 {
        format!("{}{}", size, UNITS[idx])
    } else if (value - value.trunc()).abs() < 1e-9 {
        format!("{}{}", value as u64, UNITS[idx])
    } else {
        format!("{:.1}{}", value, UNITS[idx])
    }
}
