//! C `printf` 风格的数值文本格式.
//!
//! 文本输出需要与既有数据处理脚本逐字节兼容.

/// 非负数前补空格, 与 C 的 `' '` 标志一致
fn space_sign(body: String, negative: bool) -> String {
    if negative { body } else { format!(" {body}") }
}

fn non_finite(v: f64) -> Option<String> {
    if v.is_nan() {
        Some(space_sign("nan".into(), v.is_sign_negative()))
    } else if v.is_infinite() {
        Some(space_sign("inf".into(), v < 0.0))
    } else {
        None
    }
}

/// 等价于 C `"% .Nf"`
pub fn format_fixed(v: f64, precision: usize) -> String {
    if let Some(s) = non_finite(v) {
        return s;
    }
    space_sign(format!("{v:.precision$}"), v.is_sign_negative())
}

/// 等价于 C `"% W.Nf"`: 右对齐到至少 `width` 个字符
pub fn format_fixed_width(v: f64, width: usize, precision: usize) -> String {
    let s = format_fixed(v, precision);
    format!("{s:>width$}")
}

/// 等价于 C `"% .Ne"`: 指数带符号且至少两位
pub fn format_sci(v: f64, precision: usize) -> String {
    if let Some(s) = non_finite(v) {
        return s;
    }
    let s = format!("{v:.precision$e}");
    let (mantissa, exp) = s.split_once('e').unwrap_or((s.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    space_sign(
        format!("{mantissa}e{sign}{:02}", exp.unsigned_abs()),
        v.is_sign_negative(),
    )
}
