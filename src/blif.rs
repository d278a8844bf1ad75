//! BLIF export of circuits.
//!
//! BLIF is the exchange format with the external optimiser. [`Blif::from_aig`] writes
//! one model per circuit with these conventions:
//!
//! - the constants are the nets `c0` and `c1`;
//! - nodes carry their symbol when they have one, otherwise a kind prefix and their
//!   AIGER literal (`i6`, `l8`, `a12`), the prefix being repeated when a symbol could
//!   clash with it;
//! - a latch whose next function is inverted reads the net `n<node>`, driven by an
//!   inverter;
//! - every latch starts at 0.
//!
//! [`merge_models`] wires two models into a top model with `.subckt` instances.

use std::fmt::{self, Display, Write as _};

use thiserror::Error;

use crate::aig::{Aig, AigNode};
use crate::aiger::AigerNumbering;
use crate::signal::Signal;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum BlifError {
    #[error("the model has no latch")]
    NoLatches,

    #[error("latch {0} not found")]
    MissingLatch(String),
}

/// A BLIF model kept as text.
#[derive(Debug, Clone)]
pub struct Blif {
    model: String,
    text: String,
    latch_names: Vec<String>,
}

fn is_symbol_char(ch: char) -> bool {
    ch.is_ascii_graphic() && ch != '.' && ch != '\\'
}

fn mangle(name: &str) -> String {
    let mut res = String::with_capacity(name.len());
    for ch in name.chars() {
        if is_symbol_char(ch) {
            res.push(ch);
        } else {
            let _ = write!(res, "\\{:X}", ch as u32);
        }
    }
    res
}

/// Length of the run of `ch` starting `name`, if only digits follow it.
fn prefix_run(name: &str, ch: char) -> usize {
    let run = name.chars().take_while(|&c| c == ch).count();
    if name[run..].chars().all(|c| c.is_ascii_digit()) {
        run
    } else {
        0
    }
}

struct Namer<'a> {
    aig: &'a Aig,
    numbering: AigerNumbering,
    prefix_len: usize,
}

impl<'a> Namer<'a> {
    fn new(aig: &'a Aig) -> Self {
        let symbols = aig
            .inputs()
            .map(|(_, name)| name)
            .chain(aig.latches().iter().filter_map(|l| l.name.as_deref()));
        let mut count = 0;
        for symbol in symbols {
            for ch in ['i', 'l', 'o', 'a'] {
                count = count.max(prefix_run(symbol, ch));
            }
        }
        Self {
            aig,
            numbering: AigerNumbering::new(aig),
            prefix_len: count + 1,
        }
    }

    /// Name of the net carrying the non-inverted `signal`.
    fn net(&self, signal: Signal) -> String {
        let signal = signal.regular();
        let (prefix, symbol) = match self.aig.node(signal) {
            AigNode::Const => return "c0".to_string(),
            AigNode::Input(k) => ('i', Some(self.aig.input_name(k))),
            AigNode::Latch(k) => ('l', self.aig.latch(k).name.as_deref()),
            AigNode::And(..) => ('a', None),
        };
        match symbol {
            Some(name) => mangle(name),
            None => {
                let mut res: String = std::iter::repeat(prefix).take(self.prefix_len).collect();
                let _ = write!(res, "{}", self.numbering.literal(signal));
                res
            }
        }
    }
}

fn list_line(out: &mut String, keyword: &str, names: &[String]) {
    out.push_str(keyword);
    for (i, name) in names.iter().enumerate() {
        if i > 0 && i % 10 == 0 {
            out.push_str(" \\\n");
        }
        out.push(' ');
        out.push_str(name);
    }
    out.push('\n');
}

fn bit(signal: Signal) -> char {
    if signal.is_negated() {
        '0'
    } else {
        '1'
    }
}

impl Blif {
    pub fn from_aig(aig: &Aig, model: &str) -> Self {
        let namer = Namer::new(aig);
        let mut out = String::new();
        let _ = writeln!(out, ".model {}", model);

        let inputs: Vec<String> = aig.inputs().map(|(s, _)| namer.net(s)).collect();
        list_line(&mut out, ".inputs", &inputs);
        let outputs: Vec<String> = aig.outputs().iter().map(|o| o.name.clone()).collect();
        list_line(&mut out, ".outputs", &outputs);

        let mut latch_names = Vec::with_capacity(aig.num_latches());
        let mut inverters: Vec<Signal> = Vec::new();
        for latch in aig.latches() {
            let name = namer.net(latch.output);
            if latch.next.is_const() {
                let _ = writeln!(out, ".latch c{} {} 0", latch.next.raw(), name);
            } else if latch.next.is_negated() {
                let _ = writeln!(out, ".latch n{} {} 0", namer.net(latch.next), name);
                if !inverters.contains(&latch.next) {
                    inverters.push(latch.next);
                }
            } else {
                let _ = writeln!(out, ".latch {} {} 0", namer.net(latch.next), name);
            }
            latch_names.push(name);
        }

        for (gate, a, b) in aig.ands() {
            // Larger literal first, as in the AIGER file.
            let (a, b) = if namer.numbering.literal(a) >= namer.numbering.literal(b) {
                (a, b)
            } else {
                (b, a)
            };
            let _ = writeln!(
                out,
                ".names {} {} {}\n{}{} 1",
                namer.net(a),
                namer.net(b),
                namer.net(gate),
                bit(a),
                bit(b)
            );
        }

        for output in aig.outputs() {
            let signal = output.signal;
            if signal.is_const() {
                let _ = writeln!(out, ".names c{} {}\n1 1", signal.raw(), output.name);
            } else {
                let _ = writeln!(out, ".names {} {}\n{} 1", namer.net(signal), output.name, bit(signal));
            }
        }

        for next in inverters {
            let net = namer.net(next);
            let _ = writeln!(out, ".names {} n{}\n0 1", net, net);
        }

        out.push_str(".names c0\n.names c1\n1\n.end\n");

        Self {
            model: model.to_string(),
            text: out,
            latch_names,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Net name of the latch with the given index.
    pub fn latch_name(&self, index: usize) -> Option<&str> {
        self.latch_names.get(index).map(String::as_str)
    }

    /// Makes the latch `name` read 1 on the first cycle and follow its next function
    /// afterwards.
    ///
    /// The latch is renamed `<name>Tmp`; an auxiliary latch `lltmpinit<name>` (reset 0,
    /// next `c1`) selects between the constant 1 and the renamed latch.
    pub fn init_latch_to_one(&mut self, name: &str) -> Result<(), BlifError> {
        let mut lines: Vec<String> = self
            .text
            .lines()
            .filter(|line| line.trim() != ".end")
            .map(str::to_string)
            .collect();

        let first_latch = lines
            .iter()
            .position(|line| line.starts_with(".latch "))
            .ok_or(BlifError::NoLatches)?;
        let target = lines
            .iter()
            .position(|line| {
                let tokens: Vec<&str> = line.split_whitespace().collect();
                tokens.len() >= 3 && tokens[0] == ".latch" && tokens[2] == name
            })
            .ok_or_else(|| BlifError::MissingLatch(name.to_string()))?;

        let renamed = format!("{}Tmp", name);
        let selector = format!("lltmpinit{}", name);

        let tokens: Vec<String> = lines[target].split_whitespace().map(str::to_string).collect();
        let mut replaced = vec![tokens[0].clone(), tokens[1].clone(), renamed.clone()];
        replaced.extend(tokens[3..].iter().cloned());
        lines[target] = replaced.join(" ");

        lines.insert(first_latch, format!(".latch c1 {} 0", selector));

        if !lines.iter().any(|line| line.trim() == ".names c1") {
            lines.push(".names c1".to_string());
            lines.push("1".to_string());
        }
        lines.push(format!(".names {} {} {}", renamed, selector, name));
        lines.push("-0 1".to_string());
        lines.push("11 1".to_string());
        lines.push(".end".to_string());

        self.text = lines.join("\n");
        self.text.push('\n');
        if let Some(latch) = self.latch_names.iter_mut().find(|n| *n == name) {
            *latch = renamed;
        }
        Ok(())
    }
}

impl Display for Blif {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Net connecting a sub-circuit output to a top-level output.
pub fn wired(var: &str) -> String {
    format!("In{}", var)
}

/// A top model `model` exposing `independents ++ dependents`, with the independent
/// circuit feeding its outputs into the dependent one, followed by both sub-models.
pub fn merge_models(
    model: &str,
    inputs: &[String],
    independents: &[String],
    dependents: &[String],
    indeps: &Blif,
    deps: &Blif,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, ".model {}", model);
    let _ = writeln!(out, ".inputs {}", inputs.join(" "));
    let outputs: Vec<&str> = independents
        .iter()
        .chain(dependents)
        .map(String::as_str)
        .collect();
    let _ = writeln!(out, ".outputs {}", outputs.join(" "));

    for var in &outputs {
        let _ = writeln!(out, ".names {} {}\n1 1", wired(var), var);
    }

    let input_wires: Vec<String> = inputs.iter().map(|v| format!("{}={}", v, v)).collect();
    let indep_wires: Vec<String> = independents
        .iter()
        .map(|v| format!("{}={}", v, wired(v)))
        .collect();
    let dep_wires: Vec<String> = dependents
        .iter()
        .map(|v| format!("{}={}", v, wired(v)))
        .collect();

    let indeps_ports: Vec<&str> = input_wires
        .iter()
        .chain(&indep_wires)
        .map(String::as_str)
        .collect();
    let _ = writeln!(out, ".subckt {} {}", indeps.model(), indeps_ports.join(" "));
    let deps_ports: Vec<&str> = input_wires
        .iter()
        .chain(&indep_wires)
        .chain(&dep_wires)
        .map(String::as_str)
        .collect();
    let _ = writeln!(out, ".subckt {} {}", deps.model(), deps_ports.join(" "));
    out.push_str(".end\n");

    out.push_str(indeps.as_str());
    out.push_str(deps.as_str());
    out
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    /// Inputs x, y; one unnamed latch with next !(x & !y); outputs x & !y, the inverted
    /// latch and a constant.
    fn sample() -> Aig {
        let mut aig = Aig::new();
        let x = aig.add_input("x");
        let y = aig.add_input("y");
        let q = aig.add_latch(None);
        let f = aig.and(x, !y);
        aig.set_latch_next(0, !f);
        aig.add_output("f", f);
        aig.add_output("nq", !q);
        aig.add_output("z", Signal::zero());
        aig
    }

    const SAMPLE: &str = "\
.model m
.inputs x y
.outputs f nq z
.latch na8 l6 0
.names y x a8
01 1
.names a8 f
1 1
.names l6 nq
0 1
.names c0 z
1 1
.names a8 na8
0 1
.names c0
.names c1
1
.end
";

    #[test]
    fn test_from_aig() {
        let blif = Blif::from_aig(&sample(), "m");
        assert_eq!(blif.as_str(), SAMPLE);
        assert_eq!(blif.model(), "m");
        assert_eq!(blif.latch_name(0), Some("l6"));
        assert_eq!(blif.latch_name(1), None);
    }

    #[test]
    fn test_prefix_grows_with_clashing_symbols() {
        let mut aig = Aig::new();
        let a = aig.add_input("i0");
        let b = aig.add_input("in put");
        let f = aig.and(a, b);
        aig.add_output("f", f);
        let blif = Blif::from_aig(&aig, "m");
        assert!(blif.as_str().contains(".inputs i0 in\\20put\n"));
        assert!(blif.as_str().contains(".names in\\20put i0 aa6\n11 1\n"));
    }

    #[test]
    fn test_init_latch_to_one() {
        let mut blif = Blif::from_aig(&sample(), "m");
        blif.init_latch_to_one("l6").unwrap();
        let text = blif.as_str();

        let aux = text.find(".latch c1 lltmpinitl6 0\n").unwrap();
        let renamed = text.find(".latch na8 l6Tmp 0\n").unwrap();
        assert!(aux < renamed);
        assert_eq!(text.matches(".names c1\n").count(), 1);
        assert!(text.ends_with(".names l6Tmp lltmpinitl6 l6\n-0 1\n11 1\n.end\n"));
        assert_eq!(text.matches(".end").count(), 1);
        assert_eq!(blif.latch_name(0), Some("l6Tmp"));
    }

    #[test]
    fn test_init_latch_errors() {
        let mut blif = Blif::from_aig(&sample(), "m");
        assert_eq!(
            blif.init_latch_to_one("l8"),
            Err(BlifError::MissingLatch("l8".to_string()))
        );

        let mut aig = Aig::new();
        let x = aig.add_input("x");
        aig.add_output("y", x);
        let mut blif = Blif::from_aig(&aig, "m");
        assert_eq!(blif.init_latch_to_one("l2"), Err(BlifError::NoLatches));
    }

    #[test]
    fn test_merge_models() {
        let mut indeps = Aig::new();
        let a = indeps.add_input("a");
        indeps.add_output("u", !a);
        let indeps = Blif::from_aig(&indeps, "top_indeps");

        let mut deps = Aig::new();
        let a = deps.add_input("a");
        let u = deps.add_input("u");
        let d = deps.and(a, u);
        deps.add_output("d", d);
        let deps = Blif::from_aig(&deps, "top_deps");

        let names = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let merged = merge_models("top", &names(&["a"]), &names(&["u"]), &names(&["d"]), &indeps, &deps);

        let header = "\
.model top
.inputs a
.outputs u d
.names Inu u
1 1
.names Ind d
1 1
.subckt top_indeps a=a u=Inu
.subckt top_deps a=a u=Inu d=Ind
.end
";
        assert!(merged.starts_with(header));
        assert!(merged.contains(".model top_indeps\n"));
        assert!(merged.ends_with(deps.as_str()));
    }
}
