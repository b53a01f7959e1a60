//! Parsing of command-line debugger targets and input names.

use omniframe_core::frame::access;

/// Parse a 16-bit address. Accepts `$2000`, `0x2000` or bare hex `2000`.
pub fn parse_address(text: &str) -> Result<u16, String> {
    let digits = text
        .strip_prefix('$')
        .or_else(|| text.strip_prefix("0x"))
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u16::from_str_radix(digits, 16).map_err(|_| format!("invalid address: {text:?}"))
}

/// Parse an access mask from any combination of `r`, `w` and `x`.
pub fn parse_access(text: &str) -> Result<u8, String> {
    if text.is_empty() {
        return Err("empty access mask".to_string());
    }
    text.chars().try_fold(0u8, |mask, c| {
        let bit = match c.to_ascii_lowercase() {
            'r' => access::READ,
            'w' => access::WRITE,
            'x' => access::EXECUTE,
            _ => return Err(format!("invalid access kind {c:?} in {text:?}")),
        };
        Ok(mask | bit)
    })
}

/// A watchpoint target: `ADDR` (read or write) or `ADDR:rwx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchTarget {
    pub address: u16,
    pub access: u8,
}

pub fn parse_watch(text: &str) -> Result<WatchTarget, String> {
    let (addr, mask) = match text.split_once(':') {
        Some((addr, kinds)) => (addr, parse_access(kinds)?),
        None => (text, access::READ | access::WRITE),
    };
    Ok(WatchTarget {
        address: parse_address(addr)?,
        access: mask,
    })
}

/// Joystick direction bits, by name. Names combine with `+` (`up+left`).
pub fn joystick_direction(text: &str) -> Result<u8, String> {
    text.split('+').try_fold(0u8, |bits, name| {
        let bit = match name.trim().to_ascii_lowercase().as_str() {
            "up" => 0x01,
            "down" => 0x02,
            "left" => 0x04,
            "right" => 0x08,
            "center" | "none" => 0x00,
            _ => return Err(format!("unknown joystick direction {name:?}")),
        };
        Ok(bits | bit)
    })
}

/// A `KEY=VALUE` machine argument. Only the shape is checked here; the
/// native core decides which keys it accepts.
pub fn parse_machine_arg(text: &str) -> Result<String, String> {
    match text.split_once('=') {
        Some((key, _)) if !key.is_empty() => Ok(text.to_string()),
        _ => Err(format!("expected KEY=VALUE, got {text:?}")),
    }
}
