/// Extract a signal-strength reading from one line of the bridge protocol.
///
/// Accepted shapes:
/// - a bare number: `-57`
/// - `name=value` or `name>>value`, where `name` must equal `variable`
///
/// Anything else (blank lines, other log variables, garbage) yields `None`.
pub fn parse_sample(line: &str, variable: &str) -> Option<f32> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let value = match line.split_once(">>").or_else(|| line.split_once('=')) {
        Some((name, value)) => {
            if name.trim() != variable {
                return None;
            }
            value
        }
        None => line,
    };

    value.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}
