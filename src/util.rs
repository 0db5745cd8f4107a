/// Exponents outside `EXP_MIN..EXP_LIMIT` switch to exponent notation, as the request variables of
/// previous deployments were printed with Go's `%v`.
const EXP_MIN: i32 = -4;
const EXP_LIMIT: i32 = 6;

/// Formats a float with the shortest digits that round-trip, the way Go's `%v` verb does:
/// `1234567` is `1.234567e+06`, `0.00001` is `1e-05`, `123` stays `123`.
pub(crate) fn format_float(f: f64) -> String {
    // `{:e}` yields the shortest round-trip mantissa, e.g. `1.234567e6`
    let sci = format!("{:e}", f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((mantissa, exp)) => (mantissa, exp.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };

    if exp < EXP_MIN || exp >= EXP_LIMIT {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        f.to_string()
    }
}
