use super::CellValue;

/// Format a cell value for display.
pub fn format_value(value: &CellValue) -> String {
    match value {
        CellValue::Null => String::new(),
        CellValue::Number(n) => format_number(*n),
        CellValue::Text(s) => s.clone(),
    }
}

/// Format a number for display.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "#NAN!".to_string()
    } else if n.is_infinite() {
        "#INF!".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e10 {
        format!("{:.0}", n)
    } else {
        format!("{:.2}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_rounds_fractions() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(-0.126), "-0.13");
        assert_eq!(format_number(f64::NAN), "#NAN!");
    }

    #[test]
    fn test_format_value_null_is_blank() {
        assert_eq!(format_value(&CellValue::Null), "");
        assert_eq!(format_value(&CellValue::from("east")), "east");
    }
}
