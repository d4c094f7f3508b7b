//! パース関連のユーティリティ関数

use crate::command::{BreakSpec, BreakTarget};
use crate::resolver::BreakpointOptions;
use anyhow::Result;
use nafuda_dwarf::{FunctionNameType, LanguageType};

/// アドレス文字列をu64にパース
///
/// 16進数（0xプレフィックス付き）または10進数をサポート
///
/// # Examples
/// ```
/// use nafuda_core::parse::parse_address;
///
/// assert_eq!(parse_address("0x1234").unwrap(), 0x1234);
/// assert_eq!(parse_address("1234").unwrap(), 1234);
/// ```
pub fn parse_address(s: &str) -> Result<u64> {
    let s = s.trim();

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("Invalid hexadecimal address '{}': {}", s, e))
    } else {
        s.parse::<u64>()
            .map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", s, e))
    }
}

/// `break` コマンドの引数をパースする
///
/// ```text
/// break <name>                 名前の形から種別を判定
/// break 0x401000               アドレス
/// break -F <name> [-F <name>]  完全名（-b 基底名, -S セレクタ, -M マングル名, -n 自動）
/// break -r <regex>
/// break -c <class> -s <selector>
/// 共通: -L <language> -o <offset> -P（プロローグを飛ばさない）
/// ```
pub fn parse_break_args(args: &[&str]) -> Result<BreakSpec> {
    if args.is_empty() {
        anyhow::bail!("Usage: break <name> | <address> | -r <regex> | -c <class> -s <selector>");
    }

    let mut options = BreakpointOptions::default();
    let mut names: Vec<String> = Vec::new();
    let mut mask = FunctionNameType::empty();
    let mut regex: Option<String> = None;
    let mut class_name: Option<String> = None;
    let mut selector: Option<String> = None;

    let mut iter = args.iter();
    while let Some(&arg) = iter.next() {
        let mut value = |flag: &str| -> Result<String> {
            iter.next()
                .map(|v| v.to_string())
                .ok_or_else(|| anyhow::anyhow!("Option {} requires a value", flag))
        };

        let kind = match arg {
            "-n" => Some(FunctionNameType::AUTO),
            "-F" => Some(FunctionNameType::FULL),
            "-b" => Some(FunctionNameType::BASE),
            "-S" => Some(FunctionNameType::SELECTOR),
            "-M" => Some(FunctionNameType::MANGLED),
            _ => None,
        };
        if let Some(kind) = kind {
            names.push(value(arg)?);
            mask |= kind;
            continue;
        }

        match arg {
            "-r" => regex = Some(value(arg)?),
            "-c" => class_name = Some(value(arg)?),
            "-s" => selector = Some(value(arg)?),
            "-L" => options.language = value(arg)?.parse::<LanguageType>()?,
            "-o" => options.offset = parse_address(&value(arg)?)?,
            "-P" => options.skip_prologue = false,
            flag if flag.starts_with('-') && flag.len() > 1 => {
                anyhow::bail!("Unknown option: {}", flag)
            }
            name => {
                names.push(name.to_string());
                mask |= FunctionNameType::AUTO;
            }
        }
    }

    let target = match (regex, class_name, selector) {
        (Some(pattern), None, None) if names.is_empty() => BreakTarget::Regex(pattern),
        (None, Some(class_name), Some(selector)) if names.is_empty() => {
            BreakTarget::ClassSelector {
                class_name,
                selector,
            }
        }
        (None, None, None) => match names.as_slice() {
            [single] if mask == FunctionNameType::AUTO && is_address(single) => {
                BreakTarget::Address(parse_address(single)?)
            }
            [] => anyhow::bail!("No breakpoint target given"),
            _ => BreakTarget::Names { names, mask },
        },
        (None, Some(_), None) | (None, None, Some(_)) => {
            anyhow::bail!("Options -c and -s must be given together")
        }
        _ => anyhow::bail!("Names, -r and -c/-s cannot be combined"),
    };

    Ok(BreakSpec { target, options })
}

fn is_address(s: &str) -> bool {
    s.starts_with("0x") || s.starts_with("0X")
}
