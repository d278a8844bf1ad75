//! ASCII AIGER (`aag`) reading and writing.
//!
//! The writer renumbers the graph the way the format expects: inputs first, then
//! latches, then AND gates in topological order, followed by a symbol table naming every
//! input, named latch and output.
//!
//! The reader is split in two: [`Reader`] turns text into a stream of [`Record`]s, and
//! [`Aig::from_aag`] builds a graph from them. AND gates may appear in any order.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};

use log::debug;
use thiserror::Error;

use crate::aig::Aig;
use crate::signal::Signal;

pub type Result<T> = std::result::Result<T, AigerError>;

#[derive(Debug, Error)]
pub enum AigerError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid line {line}: {reason}")]
    InvalidToken { line: usize, reason: String },

    #[error("unexpected end of file while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("literal {0} is used but never defined")]
    UndefinedLiteral(u32),

    #[error("variable {0} is defined twice")]
    DuplicateDefinition(u32),

    #[error("AND gate {0} depends on itself")]
    CombinationalCycle(u32),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
}

/// An AIGER literal: `2·variable + negated`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Literal(pub u32);

impl Literal {
    pub fn variable(self) -> u32 {
        self.0 >> 1
    }

    pub fn is_negated(self) -> bool {
        self.0 & 1 != 0
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Header {
    pub m: u32,
    pub i: u32,
    pub l: u32,
    pub o: u32,
    pub a: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SymbolKind {
    Input,
    Latch,
    Output,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Record {
    Input(Literal),
    Latch { output: Literal, next: Literal },
    Output(Literal),
    AndGate { output: Literal, inputs: [Literal; 2] },
    Symbol { kind: SymbolKind, position: usize, name: String },
}

fn parse_header(line: &str) -> Result<Header> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.first() != Some(&"aag") {
        return Err(AigerError::InvalidHeader(format!("expected 'aag', got '{}'", line)));
    }
    if tokens.len() < 6 {
        return Err(AigerError::InvalidHeader("missing M I L O A".to_string()));
    }
    if tokens.len() > 6 {
        return Err(AigerError::UnsupportedFeature(
            "header only supports M I L O A".to_string(),
        ));
    }
    let mut values = [0u32; 5];
    for (value, token) in values.iter_mut().zip(&tokens[1..]) {
        *value = token
            .parse()
            .map_err(|_| AigerError::InvalidHeader(format!("'{}' is not a number", token)))?;
    }
    let [m, i, l, o, a] = values;
    Ok(Header { m, i, l, o, a })
}

/// Reads the records of an ASCII AIGER file.
pub struct Reader {
    header: Header,
    lines: Vec<String>,
}

impl Reader {
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut lines = BufReader::new(reader).lines();
        let header = match lines.next() {
            Some(line) => parse_header(&line?)?,
            None => return Err(AigerError::UnexpectedEof("header")),
        };
        let lines = lines.collect::<io::Result<Vec<_>>>()?;
        Ok(Self { header, lines })
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn records(&self) -> Records<'_> {
        Records { reader: self, pos: 0 }
    }
}

pub struct Records<'a> {
    reader: &'a Reader,
    pos: usize,
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum Section {
    Inputs,
    Latches,
    Outputs,
    Ands,
    Symbols,
}

impl Records<'_> {
    fn section(&self) -> Section {
        let h = &self.reader.header;
        let mut bound = 0;
        for (section, count) in [
            (Section::Inputs, h.i),
            (Section::Latches, h.l),
            (Section::Outputs, h.o),
            (Section::Ands, h.a),
        ] {
            bound += count as usize;
            if self.pos < bound {
                return section;
            }
        }
        Section::Symbols
    }

    fn parse(&self, line: &str) -> Result<Record> {
        let line_no = self.pos + 2;
        let invalid = |reason: String| AigerError::InvalidToken {
            line: line_no,
            reason,
        };
        let number = |token: &str| -> Result<u32> {
            token
                .parse()
                .map_err(|_| invalid(format!("'{}' is not a literal", token)))
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let expect = |n: usize| -> Result<()> {
            if tokens.len() == n {
                Ok(())
            } else {
                Err(invalid(format!("expected {} tokens, got {}", n, tokens.len())))
            }
        };

        match self.section() {
            Section::Inputs => {
                expect(1)?;
                Ok(Record::Input(Literal(number(tokens[0])?)))
            }
            Section::Latches => {
                if tokens.len() == 3 && tokens[2] != "0" {
                    return Err(AigerError::UnsupportedFeature(format!(
                        "latch reset value {}",
                        tokens[2]
                    )));
                }
                if tokens.len() != 3 {
                    expect(2)?;
                }
                Ok(Record::Latch {
                    output: Literal(number(tokens[0])?),
                    next: Literal(number(tokens[1])?),
                })
            }
            Section::Outputs => {
                expect(1)?;
                Ok(Record::Output(Literal(number(tokens[0])?)))
            }
            Section::Ands => {
                expect(3)?;
                Ok(Record::AndGate {
                    output: Literal(number(tokens[0])?),
                    inputs: [Literal(number(tokens[1])?), Literal(number(tokens[2])?)],
                })
            }
            Section::Symbols => {
                let (head, name) = line
                    .split_once(' ')
                    .ok_or_else(|| invalid(format!("malformed symbol '{}'", line)))?;
                let kind = match head.chars().next() {
                    Some('i') => SymbolKind::Input,
                    Some('l') => SymbolKind::Latch,
                    Some('o') => SymbolKind::Output,
                    _ => return Err(invalid(format!("unknown symbol kind '{}'", head))),
                };
                let position = head[1..]
                    .parse()
                    .map_err(|_| invalid(format!("malformed symbol position '{}'", head)))?;
                Ok(Record::Symbol {
                    kind,
                    position,
                    name: name.to_string(),
                })
            }
        }
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let h = &self.reader.header;
        let body = (h.i + h.l + h.o + h.a) as usize;
        let line = match self.reader.lines.get(self.pos) {
            Some(line) => line.trim(),
            None if self.pos < body => {
                self.pos = usize::MAX;
                return Some(Err(AigerError::UnexpectedEof(
                    "the circuit definition",
                )));
            }
            None => return None,
        };
        // Comments end the symbol table.
        if self.pos >= body && (line == "c" || line.starts_with("c ") || line.is_empty()) {
            return None;
        }
        let record = self.parse(line);
        self.pos += 1;
        Some(record)
    }
}

impl Aig {
    /// Builds a graph from ASCII AIGER text.
    pub fn from_aag(reader: impl Read) -> Result<Aig> {
        let reader = Reader::from_reader(reader)?;
        let header = reader.header();

        let mut inputs = Vec::new();
        let mut latches = Vec::new();
        let mut outputs = Vec::new();
        let mut ands: HashMap<u32, [Literal; 2]> = HashMap::new();
        let mut names: HashMap<(SymbolKind, usize), String> = HashMap::new();

        for record in reader.records() {
            match record? {
                Record::Input(lit) => inputs.push(lit),
                Record::Latch { output, next } => latches.push((output, next)),
                Record::Output(lit) => outputs.push(lit),
                Record::AndGate { output, inputs } => {
                    if ands.insert(output.variable(), inputs).is_some() {
                        return Err(AigerError::DuplicateDefinition(output.variable()));
                    }
                }
                Record::Symbol { kind, position, name } => {
                    names.insert((kind, position), name);
                }
            }
        }

        let mut aig = Aig::new();
        let mut signals: HashMap<u32, Signal> = HashMap::new();
        signals.insert(0, Signal::zero());

        for (k, lit) in inputs.iter().enumerate() {
            let name = names
                .remove(&(SymbolKind::Input, k))
                .unwrap_or_else(|| format!("i{}", k));
            let signal = aig.add_input(name);
            if signals.insert(lit.variable(), signal).is_some() {
                return Err(AigerError::DuplicateDefinition(lit.variable()));
            }
        }
        for (k, (lit, _)) in latches.iter().enumerate() {
            let signal = aig.add_latch(names.remove(&(SymbolKind::Latch, k)));
            if signals.insert(lit.variable(), signal).is_some() {
                return Err(AigerError::DuplicateDefinition(lit.variable()));
            }
        }

        for (k, (_, next)) in latches.iter().enumerate() {
            let next = resolve(&mut aig, &mut signals, &ands, *next)?;
            aig.set_latch_next(k, next);
        }
        for (k, lit) in outputs.iter().enumerate() {
            let signal = resolve(&mut aig, &mut signals, &ands, *lit)?;
            let name = names
                .remove(&(SymbolKind::Output, k))
                .unwrap_or_else(|| format!("o{}", k));
            aig.add_output(name, signal);
        }

        debug!(
            "read aag with M={} I={} L={} O={} A={}, built {} AND gates",
            header.m,
            header.i,
            header.l,
            header.o,
            header.a,
            aig.num_ands()
        );
        Ok(aig)
    }

    /// Serializes the graph as ASCII AIGER.
    pub fn write_aag(&self, writer: &mut impl Write) -> io::Result<()> {
        let numbering = AigerNumbering::new(self);
        let lit = |s: Signal| numbering.literal(s);
        let ands: Vec<_> = self.ands().collect();

        writeln!(
            writer,
            "aag {} {} {} {} {}",
            numbering.max_var(),
            self.num_inputs(),
            self.num_latches(),
            self.num_outputs(),
            ands.len()
        )?;
        for (signal, _) in self.inputs() {
            writeln!(writer, "{}", lit(signal))?;
        }
        for latch in self.latches() {
            writeln!(writer, "{} {}", lit(latch.output), lit(latch.next))?;
        }
        for output in self.outputs() {
            writeln!(writer, "{}", lit(output.signal))?;
        }
        for (gate, a, b) in &ands {
            let (a, b) = (lit(*a), lit(*b));
            writeln!(writer, "{} {} {}", lit(*gate), a.max(b), a.min(b))?;
        }
        for (k, (_, name)) in self.inputs().enumerate() {
            writeln!(writer, "i{} {}", k, name)?;
        }
        for (k, latch) in self.latches().iter().enumerate() {
            if let Some(name) = &latch.name {
                writeln!(writer, "l{} {}", k, name)?;
            }
        }
        for (k, output) in self.outputs().iter().enumerate() {
            writeln!(writer, "o{} {}", k, output.name)?;
        }
        Ok(())
    }

    pub fn to_aag(&self) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.write_aag(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// The AIGER variables of a graph: inputs first, then latches, then AND gates in
/// creation order.
pub struct AigerNumbering {
    variables: HashMap<u32, u32>,
    max_var: u32,
}

impl AigerNumbering {
    pub fn new(aig: &Aig) -> Self {
        let nodes = aig
            .inputs()
            .map(|(s, _)| s)
            .chain(aig.latches().iter().map(|l| l.output))
            .chain(aig.ands().map(|(gate, _, _)| gate));
        let mut variables = HashMap::new();
        variables.insert(0, 0);
        let mut max_var = 0;
        for signal in nodes {
            max_var += 1;
            variables.insert(signal.node(), max_var);
        }
        Self { variables, max_var }
    }

    pub fn literal(&self, signal: Signal) -> u32 {
        2 * self.variables[&signal.node()] + signal.is_negated() as u32
    }

    pub fn max_var(&self) -> u32 {
        self.max_var
    }
}

/// Maps a file literal to a signal, building the AND gates it depends on.
fn resolve(
    aig: &mut Aig,
    signals: &mut HashMap<u32, Signal>,
    ands: &HashMap<u32, [Literal; 2]>,
    lit: Literal,
) -> Result<Signal> {
    let mut stack = vec![(lit.variable(), false)];
    while let Some((var, expanded)) = stack.pop() {
        if signals.contains_key(&var) {
            continue;
        }
        let operands = ands.get(&var).ok_or(AigerError::UndefinedLiteral(2 * var))?;
        if expanded {
            let a = signals[&operands[0].variable()] ^ operands[0].is_negated();
            let b = signals[&operands[1].variable()] ^ operands[1].is_negated();
            let gate = aig.and(a, b);
            signals.insert(var, gate);
        } else {
            if stack.iter().any(|&(v, e)| e && v == var) {
                return Err(AigerError::CombinationalCycle(2 * var));
            }
            stack.push((var, true));
            for operand in operands {
                if !signals.contains_key(&operand.variable()) {
                    stack.push((operand.variable(), false));
                }
            }
        }
    }
    Ok(signals[&lit.variable()] ^ lit.is_negated())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn sample() -> Aig {
        let mut aig = Aig::new();
        let a = aig.add_input("a");
        let b = aig.add_input("b");
        let q = aig.add_latch(Some("q".to_string()));
        let f = aig.and(a, !b);
        aig.set_latch_next(0, f);
        aig.add_output("f", f);
        aig.add_output("nq", !q);
        aig
    }

    const SAMPLE: &str = "aag 4 2 1 2 1\n2\n4\n6 8\n8\n7\n8 5 2\ni0 a\ni1 b\nl0 q\no0 f\no1 nq\n";

    #[test]
    fn test_write() {
        assert_eq!(sample().to_aag(), SAMPLE);
    }

    #[test]
    fn test_records() {
        let reader = Reader::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            reader.header(),
            Header {
                m: 4,
                i: 2,
                l: 1,
                o: 2,
                a: 1
            }
        );
        let records: Vec<Record> = reader.records().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 11);
        assert_eq!(records[0], Record::Input(Literal(2)));
        assert_eq!(
            records[2],
            Record::Latch {
                output: Literal(6),
                next: Literal(8)
            }
        );
        assert_eq!(records[4], Record::Output(Literal(7)));
        assert_eq!(
            records[5],
            Record::AndGate {
                output: Literal(8),
                inputs: [Literal(5), Literal(2)]
            }
        );
        assert_eq!(
            records[10],
            Record::Symbol {
                kind: SymbolKind::Output,
                position: 1,
                name: "nq".to_string()
            }
        );
    }

    #[test]
    fn test_read_behaves_like_written() {
        let original = sample();
        let parsed = Aig::from_aag(original.to_aag().as_bytes()).unwrap();
        assert_eq!(parsed.num_ands(), 1);
        assert_eq!(parsed.latch(0).name.as_deref(), Some("q"));
        assert_eq!(parsed.input_name(1), "b");

        let trace = vec![vec![true, false], vec![false, false], vec![true, true]];
        assert_eq!(parsed.simulate(&trace), original.simulate(&trace));
    }

    #[test]
    fn test_out_of_order_gates() {
        // 10 = 8 & 2 is listed before 8 = 2 & !4.
        let text = "aag 5 2 0 1 2\n2\n4\n10\n10 8 2\n8 5 2\nc\ncomment\n";
        let aig = Aig::from_aag(text.as_bytes()).unwrap();
        assert_eq!(aig.num_ands(), 2);
        assert_eq!(aig.outputs()[0].name, "o0");
        assert_eq!(aig.input_name(0), "i0");
        let out = aig.simulate(&[vec![true, false], vec![true, true]]);
        assert_eq!(out, vec![vec![true], vec![false]]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Aig::from_aag("aig 0 0 0 0 0\n".as_bytes()),
            Err(AigerError::InvalidHeader(_))
        ));
        assert!(matches!(
            Aig::from_aag("aag 1 1 0 1 0\n2\n".as_bytes()),
            Err(AigerError::UnexpectedEof(_))
        ));
        assert!(matches!(
            Aig::from_aag("aag 2 1 0 1 0\n2\n4\n".as_bytes()),
            Err(AigerError::UndefinedLiteral(4))
        ));
        assert!(matches!(
            Aig::from_aag("aag 2 1 1 0 0\n2\n4 2 1\n".as_bytes()),
            Err(AigerError::UnsupportedFeature(_))
        ));
        assert!(matches!(
            Aig::from_aag("aag 2 1 0 1 1\n2\n4\n4 4 2\n".as_bytes()),
            Err(AigerError::CombinationalCycle(4))
        ));
    }
}
