//! Text encodings used in the `msgdata` element

use crate::error::RestParseError;

const COIL_ON: &str = "ff00";
const COIL_OFF: &str = "0000";

fn invalid(text: &str) -> RestParseError {
    RestParseError::InvalidMsgData(text.to_string())
}

/// One `0`/`1` character per bit in address order, padded with `0` to a whole number of bytes
pub(crate) fn bits_to_text(values: &[bool]) -> String {
    let padded = (values.len() + 7) / 8 * 8;
    let mut text: String = values.iter().map(|x| if *x { '1' } else { '0' }).collect();
    while text.len() < padded {
        text.push('0');
    }
    text
}

/// Decode the first `count` bits of a `0`/`1` string
///
/// The string may carry up to 8 characters of padding beyond `count`.
pub(crate) fn text_to_bits(text: &str, count: usize) -> Result<Vec<bool>, RestParseError> {
    if text.len() < count || text.len() > count + 8 {
        return Err(invalid(text));
    }
    let values = text
        .chars()
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            _ => Err(invalid(text)),
        })
        .collect::<Result<Vec<bool>, RestParseError>>()?;
    Ok(values.into_iter().take(count).collect())
}

/// Four lowercase hex digits per register
pub(crate) fn registers_to_hex(values: &[u16]) -> String {
    let bytes: Vec<u8> = values.iter().flat_map(|x| x.to_be_bytes()).collect();
    hex::encode(bytes)
}

/// Decode groups of four hex digits, case-insensitive
pub(crate) fn hex_to_registers(text: &str) -> Result<Vec<u16>, RestParseError> {
    if text.is_empty() || text.len() % 4 != 0 {
        return Err(invalid(text));
    }
    let bytes = hex::decode(text).map_err(|_| invalid(text))?;
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

pub(crate) fn coil_to_text(value: bool) -> &'static str {
    if value {
        COIL_ON
    } else {
        COIL_OFF
    }
}

pub(crate) fn text_to_coil(text: &str) -> Result<bool, RestParseError> {
    if text.eq_ignore_ascii_case(COIL_ON) {
        Ok(true)
    } else if text == COIL_OFF {
        Ok(false)
    } else {
        Err(invalid(text))
    }
}

/// Minimal escaping for element text
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_padded_to_whole_bytes() {
        assert_eq!(bits_to_text(&[true, false, true]), "10100000");
        assert_eq!(bits_to_text(&[true; 8]), "11111111");
        assert_eq!(bits_to_text(&[false; 9]).len(), 16);
    }

    #[test]
    fn bit_text_tolerates_up_to_eight_characters_of_padding() {
        assert_eq!(text_to_bits("101", 3), Ok(vec![true, false, true]));
        assert_eq!(text_to_bits("10100000", 3), Ok(vec![true, false, true]));
        assert_eq!(text_to_bits("10100000000", 3), Ok(vec![true, false, true]));
        assert!(text_to_bits("101000000000", 3).is_err());
        assert!(text_to_bits("10", 3).is_err());
        assert!(text_to_bits("1x1", 3).is_err());
    }

    #[test]
    fn registers_are_four_hex_digits_each() {
        assert_eq!(registers_to_hex(&[0xCAFE, 0x0001]), "cafe0001");
        assert_eq!(hex_to_registers("CAFE0001"), Ok(vec![0xCAFE, 0x0001]));
        assert!(hex_to_registers("caf").is_err());
        assert!(hex_to_registers("zzzz").is_err());
        assert!(hex_to_registers("").is_err());
    }

    #[test]
    fn single_coil_text_is_case_insensitive() {
        assert_eq!(text_to_coil("FF00"), Ok(true));
        assert_eq!(text_to_coil("fF00"), Ok(true));
        assert_eq!(text_to_coil("0000"), Ok(false));
        assert!(text_to_coil("0001").is_err());
        assert_eq!(coil_to_text(true), "ff00");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("a<b&c>"), "a&lt;b&amp;c&gt;");
    }
}
