//! デバッガコマンド

use crate::parse::{parse_address, parse_break_args};
use crate::resolver::BreakpointOptions;
use crate::{BreakpointId, Result};
use nafuda_dwarf::FunctionNameType;

/// ブレークポイントの指定先
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakTarget {
    /// 関数名（1つ以上）
    Names {
        names: Vec<String>,
        mask: FunctionNameType,
    },
    /// 関数名の正規表現
    Regex(String),
    /// Objective-Cのクラスとセレクタ
    ClassSelector { class_name: String, selector: String },
    /// ロードアドレス
    Address(u64),
}

/// `break` コマンドの引数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakSpec {
    pub target: BreakTarget,
    pub options: BreakpointOptions,
}

/// デバッガコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// ブレークポイントを設定
    Break(BreakSpec),
    /// バイナリを読み込む
    Load { path: String, slide: u64 },
    /// ブレークポイント一覧表示
    InfoBreak,
    /// ブレークポイントを削除
    Delete(BreakpointId),
    /// ブレークポイントを複製
    Copy(BreakpointId),
    /// ブレークポイントを有効化・無効化
    Enable(BreakpointId, bool),
    /// シンボル検索
    Find(String),
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

impl Command {
    /// コマンド文字列をパースする
    ///
    /// 空行ならNone、解釈できない入力はエラー。
    pub fn parse(input: &str) -> Result<Option<Self>> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some((&head, args)) = parts.split_first() else {
            return Ok(None);
        };

        let command = match head {
            "break" | "b" => Command::Break(parse_break_args(args)?),
            "load" => match args {
                [path] => Command::Load {
                    path: path.to_string(),
                    slide: 0,
                },
                [path, slide] => Command::Load {
                    path: path.to_string(),
                    slide: parse_address(slide)?,
                },
                _ => anyhow::bail!("Usage: load <path> [slide]"),
            },
            "info" | "i" => match args {
                ["break" | "b" | "breakpoints"] => Command::InfoBreak,
                _ => anyhow::bail!("Usage: info break"),
            },
            "delete" | "d" => Command::Delete(parse_id(args, "delete")?),
            "copy" => Command::Copy(parse_id(args, "copy")?),
            "enable" => Command::Enable(parse_id(args, "enable")?, true),
            "disable" => Command::Enable(parse_id(args, "disable")?, false),
            "find" | "f" => match args {
                [pattern] => Command::Find(pattern.to_string()),
                _ => anyhow::bail!("Usage: find <pattern>"),
            },
            "help" | "h" | "?" => Command::Help,
            "quit" | "q" | "exit" => Command::Quit,
            other => anyhow::bail!("Unknown command: {}", other),
        };
        Ok(Some(command))
    }
}

fn parse_id(args: &[&str], command: &str) -> Result<BreakpointId> {
    match args {
        [id] => id
            .parse::<BreakpointId>()
            .map_err(|e| anyhow::anyhow!("Invalid breakpoint id '{}': {}", id, e)),
        _ => anyhow::bail!("Usage: {} <breakpoint id>", command),
    }
}
