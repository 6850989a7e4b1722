//! XMLBIF 0.3 reader and writer.
//!
//! ```text
//! <BIF VERSION="0.3">
//! <NETWORK>
//!   <NAME>sprinkler</NAME>
//!   <VARIABLE TYPE="nature">
//!     <NAME>rain</NAME>
//!     <OUTCOME>true</OUTCOME>
//!     <OUTCOME>false</OUTCOME>
//!   </VARIABLE>
//!   <DEFINITION>
//!     <FOR>rain</FOR>
//!     <TABLE>0.2 0.8</TABLE>
//!   </DEFINITION>
//! </NETWORK>
//! </BIF>
//! ```
//!
//! `GIVEN` elements list the parents in table order: the `FOR` variable
//! varies fastest, then the last parent. `PROPERTY` elements are ignored.
//!
//! Errors carry the element path of the offending node, e.g.
//! `BIF/NETWORK/DEFINITION[2]/TABLE`.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::network::Network;

// ─── XML tree ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn children_named(&self, name: &'static str) -> impl Iterator<Item = &Element> + '_ {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn required(&self, name: &str, path: &str) -> Result<&Element> {
        self.child(name)
            .ok_or_else(|| Error::parse(path, format!("missing <{}>", name)))
    }

    fn text(&self) -> &str {
        self.text.trim()
    }
}

struct XmlReader<'a> {
    src: &'a str,
    pos: usize,
    stack: Vec<String>,
}

impl<'a> XmlReader<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.trim_start_matches('\u{feff}'),
            pos: 0,
            stack: Vec::new(),
        }
    }

    fn path(&self) -> String {
        if self.stack.is_empty() {
            "/".to_string()
        } else {
            self.stack.join("/")
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::parse(self.path(), message)
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn skip_past(&mut self, end: &str) -> Result<()> {
        match self.rest().find(end) {
            Some(i) => {
                self.pos += i + end.len();
                Ok(())
            }
            None => Err(self.error(format!("unterminated construct, expected `{}`", end))),
        }
    }

    /// Skips `<!DOCTYPE ...>`, which may contain a bracketed internal subset.
    fn skip_doctype(&mut self) -> Result<()> {
        let mut depth = 0usize;
        for (i, c) in self.rest().char_indices() {
            match c {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '>' if depth == 0 => {
                    self.pos += i + 1;
                    return Ok(());
                }
                _ => {}
            }
        }
        Err(self.error("unterminated DOCTYPE"))
    }

    /// Skips whitespace, comments, processing instructions and DOCTYPE declarations.
    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.skip_ws();
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if rest.starts_with("<!DOCTYPE") {
                self.skip_doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    fn document(mut self) -> Result<Element> {
        self.skip_misc()?;
        if !self.rest().starts_with('<') {
            return Err(self.error("expected a root element"));
        }
        let root = self.element()?;
        self.skip_misc()?;
        if !self.rest().is_empty() {
            return Err(self.error("unexpected content after the root element"));
        }
        Ok(root)
    }

    fn name(&mut self) -> Result<String> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/' || c == '=')
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("expected a name"));
        }
        self.pos += len;
        Ok(rest[..len].to_string())
    }

    fn element(&mut self) -> Result<Element> {
        self.pos += 1; // '<'
        let name = self.name()?;
        let index = self.stack.len();
        self.stack.push(name.clone());

        let mut element = Element {
            name,
            ..Default::default()
        };

        // Attributes.
        loop {
            self.skip_ws();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                self.stack.truncate(index);
                return Ok(element);
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.is_empty() {
                return Err(self.error("unexpected end of input in a start tag"));
            }
            let key = self.name()?;
            self.skip_ws();
            if !self.rest().starts_with('=') {
                return Err(self.error(format!("attribute `{}` has no value", key)));
            }
            self.pos += 1;
            self.skip_ws();
            let quote = match self.rest().chars().next() {
                Some(q @ ('"' | '\'')) => q,
                _ => return Err(self.error(format!("attribute `{}` is not quoted", key))),
            };
            self.pos += 1;
            let Some(end) = self.rest().find(quote) else {
                return Err(self.error(format!("unterminated value of attribute `{}`", key)));
            };
            let value = decode_entities(&self.rest()[..end]).map_err(|m| self.error(m))?;
            self.pos += end + 1;
            element.attrs.push((key, value));
        }

        // Content.
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(format!("unclosed element <{}>", element.name)));
            }
            if rest.starts_with("</") {
                self.pos += 2;
                let closing = self.name()?;
                if closing != element.name {
                    return Err(self.error(format!(
                        "mismatched closing tag </{}>, expected </{}>",
                        closing, element.name
                    )));
                }
                self.skip_ws();
                if !self.rest().starts_with('>') {
                    return Err(self.error(format!("malformed closing tag </{}>", closing)));
                }
                self.pos += 1;
                self.stack.truncate(index);
                return Ok(element);
            }
            if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if rest.starts_with("<![CDATA[") {
                self.pos += "<![CDATA[".len();
                let Some(end) = self.rest().find("]]>") else {
                    return Err(self.error("unterminated CDATA section"));
                };
                element.text.push_str(&self.rest()[..end]);
                self.pos += end + 3;
            } else if rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if rest.starts_with('<') {
                let child = self.element()?;
                element.children.push(child);
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let text = decode_entities(&rest[..end]).map_err(|m| self.error(m))?;
                element.text.push_str(&text);
                self.pos += end;
            }
        }
    }
}

fn decode_entities(text: &str) -> std::result::Result<String, String> {
    if !text.contains('&') {
        return Ok(text.to_string());
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        rest = &rest[i..];
        let Some(end) = rest.find(';') else {
            return Err(format!("unterminated entity in `{}`", text));
        };
        let entity = &rest[1..end];
        let decoded = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| format!("unknown entity `&{};`", entity))?
            }
        };
        out.push(decoded);
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ─── Reading ──────────────────────────────────────────────────────────────────

/// Parses an XMLBIF document.
pub fn read_str(content: &str) -> Result<Network> {
    let root = XmlReader::new(content).document()?;

    let (network_el, base) = match root.name.as_str() {
        "BIF" => (root.required("NETWORK", "BIF")?, "BIF/NETWORK".to_string()),
        "NETWORK" => (&root, "NETWORK".to_string()),
        other => return Err(Error::parse(other, format!("unexpected root element <{}>", other))),
    };

    let name = network_el.child("NAME").map(Element::text).unwrap_or_default();
    let mut network = Network::new(name);

    for (i, var_el) in network_el.children_named("VARIABLE").enumerate() {
        let path = format!("{}/VARIABLE[{}]", base, i);
        let name = var_el.required("NAME", &path)?.text();
        if name.is_empty() {
            return Err(Error::parse(format!("{}/NAME", path), "empty variable name"));
        }
        let outcomes: Vec<&str> = var_el.children_named("OUTCOME").map(Element::text).collect();
        if outcomes.is_empty() {
            return Err(Error::parse(&path, format!("variable `{}` has no <OUTCOME>", name)));
        }
        network
            .add_variable(name, outcomes)
            .map_err(|e| Error::parse(&path, e.to_string()))?;
    }

    let mut defined = vec![false; network.len()];
    for (i, def_el) in network_el.children_named("DEFINITION").enumerate() {
        let path = format!("{}/DEFINITION[{}]", base, i);
        let for_name = def_el.required("FOR", &path)?.text();
        let var = network
            .id(for_name)
            .map_err(|e| Error::parse(format!("{}/FOR", path), e.to_string()))?;
        if std::mem::replace(&mut defined[var.index()], true) {
            return Err(Error::parse(
                format!("{}/FOR", path),
                format!("variable `{}` is defined twice", for_name),
            ));
        }

        for (j, given_el) in def_el.children_named("GIVEN").enumerate() {
            let given_path = format!("{}/GIVEN[{}]", path, j);
            let parent = network
                .id(given_el.text())
                .map_err(|e| Error::parse(&given_path, e.to_string()))?;
            network
                .add_parent(var, parent)
                .map_err(|e| Error::parse(&given_path, e.to_string()))?;
        }

        let table_path = format!("{}/TABLE", path);
        let table = def_el
            .required("TABLE", &path)?
            .text()
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>()
                    .map_err(|_| Error::parse(&table_path, format!("invalid number `{}`", tok)))
            })
            .collect::<Result<Vec<f64>>>()?;
        network
            .set_probabilities(var, &table)
            .map_err(|e| Error::parse(&table_path, e.to_string()))?;
    }

    debug!(
        "read_str: network `{}` with {} variables",
        network.name(),
        network.len()
    );
    Ok(network)
}

pub fn read_file(path: impl AsRef<Path>) -> Result<Network> {
    let content = fs::read_to_string(path)?;
    read_str(&content)
}

// ─── Writing ──────────────────────────────────────────────────────────────────

/// Serializes a network as an XMLBIF 0.3 document.
pub fn write_string(network: &Network) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    write_network(network, &mut out)?;
    Ok(out)
}

fn write_network(network: &Network, out: &mut String) -> std::fmt::Result {
    writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(out, "<BIF VERSION=\"0.3\">")?;
    writeln!(out, "<NETWORK>")?;
    writeln!(out, "<NAME>{}</NAME>", escape(network.name()))?;
    writeln!(out)?;

    for var in network.variables() {
        writeln!(out, "<VARIABLE TYPE=\"nature\">")?;
        writeln!(out, "    <NAME>{}</NAME>", escape(var.name()))?;
        for label in var.domain() {
            writeln!(out, "    <OUTCOME>{}</OUTCOME>", escape(label))?;
        }
        writeln!(out, "</VARIABLE>")?;
        writeln!(out)?;
    }

    for var in network.variables() {
        writeln!(out, "<DEFINITION>")?;
        writeln!(out, "    <FOR>{}</FOR>", escape(var.name()))?;
        for &p in var.parents() {
            writeln!(out, "    <GIVEN>{}</GIVEN>", escape(network.variable(p).name()))?;
        }
        let table: Vec<String> = var.cpt().iter().map(|p| p.to_string()).collect();
        writeln!(out, "    <TABLE>{}</TABLE>", table.join(" "))?;
        writeln!(out, "</DEFINITION>")?;
        writeln!(out)?;
    }

    writeln!(out, "</NETWORK>")?;
    writeln!(out, "</BIF>")
}

pub fn write_file(network: &Network, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, write_string(network)?)?;
    Ok(())
}
