//! dhcpd.conf scanner.
//!
//! Only the statements that declare address space are interpreted:
//! `shared-network`, `subnet`, `subnet6`, `range`, `range6` and `include`.
//! Every other statement or block is skipped, but its braces are tracked so
//! ranges nested in `pool` or `group` blocks still land in the right shared
//! network.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};

use crate::address::AddressFamily;
use crate::error::{Error, Result};
use crate::pool::{NetworkId, Pools};

/// Nested `include` files deeper than this are rejected.
const MAX_INCLUDE_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
    Semicolon,
}

fn tokenize(text: &str) -> Vec<(Token, usize)> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '#' => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '{' => tokens.push((Token::Open, line)),
            '}' => tokens.push((Token::Close, line)),
            ';' => tokens.push((Token::Semicolon, line)),
            '"' => {
                let start = line;
                let mut word = String::new();
                while let Some(next) = chars.next() {
                    match next {
                        '"' => break,
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                word.push(escaped);
                            }
                        }
                        '\n' => {
                            line += 1;
                            word.push(next);
                        }
                        other => word.push(other),
                    }
                }
                tokens.push((Token::Word(word), start));
            }
            first => {
                let mut word = String::from(first);
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || matches!(next, '{' | '}' | ';' | '"' | '#') {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push((Token::Word(word), line));
            }
        }
    }
    tokens
}

/// Options that change how declarations map to shared networks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfOptions {
    /// Treat a subnet outside any shared network as a shared network named
    /// by its CIDR.
    pub all_as_shared: bool,
}

/// Reads a dhcpd.conf file (and its includes) into `pools`.
pub fn load_dhcpd_conf(pools: &mut Pools, path: &Path, options: ConfOptions) -> Result<()> {
    let before = pools.ranges().len();
    load_file(pools, path, NetworkId::ROOT, options, 0)?;
    info!(
        "Read {} ranges in {} shared networks from {}",
        pools.ranges().len() - before,
        pools.networks().shared_count(),
        path.display()
    );
    Ok(())
}

fn load_file(
    pools: &mut Pools,
    path: &Path,
    network: NetworkId,
    options: ConfOptions,
    depth: usize,
) -> Result<()> {
    debug!("Reading configuration {}", path.display());
    let text = std::fs::read_to_string(path)?;
    ConfParser {
        pools,
        path,
        options,
        depth,
    }
    .parse(&text, network)
}

/// Parses dhcpd.conf text. `path` only labels error messages; included
/// files are resolved against the working directory, as dhcpd does.
pub fn parse_dhcpd_conf(
    pools: &mut Pools,
    text: &str,
    path: &Path,
    options: ConfOptions,
) -> Result<()> {
    ConfParser {
        pools,
        path,
        options,
        depth: 0,
    }
    .parse(text, NetworkId::ROOT)
}

struct ConfParser<'a> {
    pools: &'a mut Pools,
    path: &'a Path,
    options: ConfOptions,
    depth: usize,
}

impl ConfParser<'_> {
    fn error(&self, line: usize, message: impl Into<String>) -> Error {
        Error::Parse {
            path: self.path.to_path_buf(),
            line,
            message: message.into(),
        }
    }

    fn parse(&mut self, text: &str, base: NetworkId) -> Result<()> {
        let mut blocks: Vec<NetworkId> = Vec::new();
        let mut statement: Vec<String> = Vec::new();
        let mut statement_line = 0;

        for (token, line) in tokenize(text) {
            let current = blocks.last().copied().unwrap_or(base);
            match token {
                Token::Word(word) => {
                    if statement.is_empty() {
                        statement_line = line;
                    }
                    statement.push(word);
                }
                Token::Semicolon => {
                    self.statement(&statement, current, statement_line)?;
                    statement.clear();
                }
                Token::Open => {
                    let inner = self.block(&statement, current, statement_line)?;
                    blocks.push(inner);
                    statement.clear();
                }
                Token::Close => {
                    if !statement.is_empty() {
                        let message = format!("missing ';' after '{}'", statement.join(" "));
                        return Err(self.error(line, message));
                    }
                    if blocks.pop().is_none() {
                        return Err(self.error(line, "unbalanced '}'"));
                    }
                }
            }
        }

        if !statement.is_empty() {
            return Err(self.error(statement_line, "unterminated statement at end of file"));
        }
        if !blocks.is_empty() {
            return Err(self.error(statement_line, "missing '}' at end of file"));
        }
        Ok(())
    }

    /// Handles a `keyword … {` header and returns the network its contents
    /// belong to.
    fn block(&mut self, words: &[String], current: NetworkId, line: usize) -> Result<NetworkId> {
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        match words.as_slice() {
            ["shared-network", name] => Ok(self.pools.add_shared_network(*name)),
            ["subnet", address, "netmask", mask] => {
                self.pools.detect_family(address);
                if self.options.all_as_shared && current.is_root() {
                    let mask: Ipv4Addr = mask
                        .parse()
                        .map_err(|_| self.error(line, format!("invalid netmask {}", mask)))?;
                    let prefix = AddressFamily::prefix_from_netmask(mask).ok_or_else(|| {
                        self.error(line, format!("non-contiguous netmask {}", mask))
                    })?;
                    Ok(self.pools.add_shared_network(format!("{}/{}", address, prefix)))
                } else {
                    Ok(current)
                }
            }
            ["subnet6", cidr] => {
                self.pools.detect_family(cidr);
                if self.options.all_as_shared && current.is_root() {
                    Ok(self.pools.add_shared_network(*cidr))
                } else {
                    Ok(current)
                }
            }
            _ => {
                trace!("{}:{}: skipping block {:?}", self.path.display(), line, words);
                Ok(current)
            }
        }
    }

    fn statement(&mut self, words: &[String], network: NetworkId, line: usize) -> Result<()> {
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        match words.as_slice() {
            ["range", rest @ ..] => {
                let addresses: Vec<&str> = rest
                    .iter()
                    .copied()
                    .filter(|word| *word != "dynamic-bootp")
                    .collect();
                match addresses.as_slice() {
                    [single] => self.add_range(network, single, single, line),
                    [first, last] => self.add_range(network, first, last, line),
                    _ => Err(self.error(line, "range needs one or two addresses")),
                }
            }
            ["range6", rest @ ..] => {
                let args: Vec<&str> = rest
                    .iter()
                    .copied()
                    .filter(|word| *word != "temporary")
                    .collect();
                match args.as_slice() {
                    [cidr] if cidr.contains('/') => self
                        .pools
                        .add_cidr_range(network, cidr)
                        .map_err(|error| self.error(line, error.to_string())),
                    [single] => self.add_range(network, single, single, line),
                    [first, last] => self.add_range(network, first, last, line),
                    _ => Err(self.error(line, "range6 needs a prefix or two addresses")),
                }
            }
            ["include", file] => {
                if self.depth >= MAX_INCLUDE_DEPTH {
                    return Err(self.error(line, format!("include nesting too deep at {}", file)));
                }
                let include = PathBuf::from(*file);
                load_file(&mut *self.pools, &include, network, self.options, self.depth + 1)
            }
            _ => Ok(()),
        }
    }

    fn add_range(
        &mut self,
        network: NetworkId,
        first: &str,
        last: &str,
        line: usize,
    ) -> Result<()> {
        let first = self
            .pools
            .parse_address(first)
            .map_err(|error| self.error(line, error.to_string()))?;
        let last = self
            .pools
            .parse_address(last)
            .map_err(|error| self.error(line, error.to_string()))?;
        self.pools
            .add_range(network, first, last)
            .map_err(|error| self.error(line, error.to_string()))
    }
}
