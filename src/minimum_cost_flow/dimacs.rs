//! DIMACS min-cost flow reader and DIMACS/MPS writers.
//!
//! The reader accepts the usual `c`/`p min`/`n`/`a` lines, with one
//! extension: node and arc lines may be interleaved in any order after the
//! problem line. Node ids are 1-based regardless of the solver's name base;
//! an `n` line states the node's *supply*, stored internally as the negated
//! deficit, and arc lower bounds are shifted into the endpoint deficits
//! (`cap = hi - lo`). The parser fails on the first malformed line.

use crate::minimum_cost_flow::error::{McfError, Result};
use crate::minimum_cost_flow::solver::{McfSolver, Network};
use crate::numeric::{NameBase, Scalar};
use std::io::{BufRead, Write};

/// Text formats understood by [`McfSolver::write`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FileFormat {
    #[default]
    Dimacs,
    /// Tab-separated MPS.
    Mps,
    /// Fixed-width MPS.
    FixedMps,
}

fn fail(line: usize, msg: &str) -> McfError {
    McfError::invalid(format!("dimacs line {line}: {msg}"))
}

fn parse_token<'a, T: std::str::FromStr>(
    it: &mut impl Iterator<Item = &'a str>,
    line: usize,
    what: &str,
) -> Result<T> {
    it.next()
        .and_then(|token| token.parse::<T>().ok())
        .ok_or_else(|| fail(line, &format!("missing or malformed {what}")))
}

pub(crate) fn load<F, C, S>(solver: &mut S, reader: impl BufRead) -> Result<()>
where
    F: Scalar,
    C: Scalar,
    S: McfSolver<F, C>,
{
    let base = solver.name_base().offset();
    let mut header: Option<(usize, usize)> = None;
    let mut net: Network<F, C> = Network::default();
    let mut seen_arcs = 0usize;

    for (no, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = no + 1;
        let mut it = line.split_whitespace();
        let Some(code) = it.next() else { continue };
        match code {
            "c" => {}
            "p" => {
                if header.is_some() {
                    return Err(fail(lineno, "duplicate problem line"));
                }
                if it.next() != Some("min") {
                    return Err(fail(lineno, "expected a `min` problem"));
                }
                let n: usize = parse_token(&mut it, lineno, "node count")?;
                let m: usize = parse_token(&mut it, lineno, "arc count")?;
                header = Some((n, m));
                net.deficits = vec![F::zero(); n];
            }
            "n" => {
                let (n, _) = header.ok_or_else(|| fail(lineno, "node line before the problem line"))?;
                let id: usize = parse_token(&mut it, lineno, "node name")?;
                if id < 1 || id > n {
                    return Err(fail(lineno, "invalid node name"));
                }
                let supply: F = parse_token(&mut it, lineno, "supply")?;
                net.deficits[id - 1] -= supply;
            }
            "a" => {
                let (n, m) = header.ok_or_else(|| fail(lineno, "arc line before the problem line"))?;
                if seen_arcs == m {
                    return Err(fail(lineno, "too many arc descriptors"));
                }
                let tail: usize = parse_token(&mut it, lineno, "start node")?;
                if tail < 1 || tail > n {
                    return Err(fail(lineno, "invalid start node"));
                }
                let head: usize = parse_token(&mut it, lineno, "end node")?;
                if head < 1 || head > n {
                    return Err(fail(lineno, "invalid end node"));
                }
                if tail == head {
                    return Err(fail(lineno, "self-loops are not permitted"));
                }
                let lo: F = parse_token(&mut it, lineno, "lower bound")?;
                let hi: F = parse_token(&mut it, lineno, "upper bound")?;
                let cost: C = parse_token(&mut it, lineno, "arc cost")?;
                if hi < lo {
                    return Err(fail(lineno, "lower bound exceeds upper bound"));
                }
                net.deficits[tail - 1] += lo;
                net.deficits[head - 1] -= lo;
                net.tails.push(tail - 1 + base);
                net.heads.push(head - 1 + base);
                net.caps.push(hi - lo);
                net.costs.push(cost);
                seen_arcs += 1;
            }
            _ => return Err(fail(lineno, "unrecognized line code")),
        }
    }

    let (n, m) = header.ok_or_else(|| McfError::invalid("dimacs: missing problem line"))?;
    if seen_arcs < m {
        return Err(McfError::invalid("dimacs: too few arc descriptors"));
    }
    solver.load_net(n, m, &net)
}

pub(crate) fn write<F, C, S, W>(solver: &S, out: &mut W, format: FileFormat) -> Result<()>
where
    F: Scalar,
    C: Scalar,
    S: McfSolver<F, C>,
    W: Write,
{
    match format {
        FileFormat::Dimacs => write_dimacs(solver, out),
        FileFormat::Mps => write_mps(solver, out, false),
        FileFormat::FixedMps => write_mps(solver, out, true),
    }
}

fn live_arcs<F: Scalar, C: Scalar>(solver: &impl McfSolver<F, C>) -> Vec<usize> {
    (0..solver.num_arcs())
        .filter(|&k| !solver.is_closed_arc(k) && !solver.is_deleted_arc(k))
        .collect()
}

fn write_dimacs<F, C, S, W>(solver: &S, out: &mut W) -> Result<()>
where
    F: Scalar,
    C: Scalar,
    S: McfSolver<F, C>,
    W: Write,
{
    let n = solver.num_nodes();
    let base = solver.name_base().offset();
    // DIMACS names are 1-based whatever the solver convention
    let up = if solver.name_base() == NameBase::Zero { 1 } else { 0 };
    let live = live_arcs(solver);
    writeln!(out, "p min {} {}", n, live.len())?;
    for &k in &live {
        writeln!(
            out,
            "a\t{}\t{}\t0\t{}\t{}",
            solver.arc_tail(k)? + up,
            solver.arc_head(k)? + up,
            solver.arc_cap(k)?,
            solver.arc_cost(k)?
        )?;
    }
    for v in 0..n {
        let deficit = solver.node_deficit(v + base)?;
        if deficit != F::zero() {
            writeln!(out, "n\t{}\t{}", v + 1, -deficit)?;
        }
    }
    Ok(())
}

/// One equality row per node with its deficit as right-hand side, one
/// column per non-closed arc with the objective coefficient and the two
/// incidence entries, and an `UP` bound per column.
fn write_mps<F, C, S, W>(solver: &S, out: &mut W, fixed: bool) -> Result<()>
where
    F: Scalar,
    C: Scalar,
    S: McfSolver<F, C>,
    W: Write,
{
    let n = solver.num_nodes();
    let base = solver.name_base().offset();
    let live = live_arcs(solver);
    writeln!(out, "NAME      MCF")?;
    writeln!(out, "ROWS")?;
    writeln!(out, " N  obj")?;
    for v in 0..n {
        writeln!(out, " E  c{v}")?;
    }
    writeln!(out, "COLUMNS")?;
    for &k in &live {
        let x = format!("x{k}");
        let cost = solver.arc_cost(k)?;
        let tail = format!("c{}", solver.arc_tail(k)? - base);
        let head = format!("c{}", solver.arc_head(k)? - base);
        if fixed {
            writeln!(out, "    {x:<8}  {:<8}  {cost:<12}   {tail:<8}  {:<12}", "obj", -1)?;
            writeln!(out, "    {x:<8}  {head:<8}  {:<12}", 1)?;
        } else {
            writeln!(out, " {x}\tobj\t{cost}\t{tail}\t-1")?;
            writeln!(out, " {x}\t{head}\t1")?;
        }
    }
    writeln!(out, "RHS")?;
    for v in 0..n {
        let deficit = solver.node_deficit(v + base)?;
        if deficit != F::zero() {
            if fixed {
                writeln!(out, "    {:<8}  {:<8}  {deficit:<12}", "rhs", format!("c{v}"))?;
            } else {
                writeln!(out, "    rhs\tc{v}\t{deficit}")?;
            }
        }
    }
    writeln!(out, "BOUNDS")?;
    for &k in &live {
        let cap = solver.arc_cap(k)?;
        if fixed {
            writeln!(out, " UP {:<8}  {:<8}  {cap:<12}", "bnd", format!("x{k}"))?;
        } else {
            writeln!(out, " UP bnd x{k} {cap}")?;
        }
    }
    writeln!(out, "ENDATA")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minimum_cost_flow::cost_scaling::Cs2;
    use crate::minimum_cost_flow::status::Status;
    use rstest::rstest;

    fn parse(text: &str) -> Result<Cs2<i64, i64>> {
        let mut cs2 = Cs2::default();
        cs2.load_dimacs(text.as_bytes())?;
        Ok(cs2)
    }

    #[test]
    fn reads_a_plain_instance() {
        let cs2 = parse(
            "c a two node instance\n\
             p min 2 1\n\
             n 1 3\n\
             a 1 2 0 5 7\n",
        )
        .unwrap();
        assert_eq!(cs2.num_nodes(), 2);
        assert_eq!(cs2.num_arcs(), 1);
        assert_eq!(cs2.node_deficit(1).unwrap(), -3);
        assert_eq!(cs2.arc_cap(0).unwrap(), 5);
        assert_eq!(cs2.arc_cost(0).unwrap(), 7);
    }

    #[test]
    fn node_and_arc_lines_may_interleave() {
        let mut cs2 = parse(
            "p min 2 1\n\
             a 1 2 0 4 1\n\
             n 1 2\n\
             n 2 -2\n",
        )
        .unwrap();
        assert_eq!(cs2.solve().unwrap(), Status::Optimal);
        assert_eq!(cs2.get_fo(), 2);
    }

    #[test]
    fn lower_bounds_shift_into_the_deficits() {
        let cs2 = parse(
            "p min 2 1\n\
             a 1 2 2 5 3\n",
        )
        .unwrap();
        // two forced units leave node 1 and enter node 2
        assert_eq!(cs2.node_deficit(1).unwrap(), 2);
        assert_eq!(cs2.node_deficit(2).unwrap(), -2);
        assert_eq!(cs2.arc_cap(0).unwrap(), 3);
    }

    #[rstest]
    #[case("p min 2 1\na 1 1 0 5 1\n", "self-loops")]
    #[case("p min 2 1\na 1 2 5 2 1\n", "lower bound exceeds")]
    #[case("p min 2 1\na 1 3 0 5 1\n", "invalid end node")]
    #[case("p min 2 1\nq 1 2\n", "unrecognized line code")]
    #[case("n 1 3\np min 2 0\n", "before the problem line")]
    #[case("p min 2 2\na 1 2 0 5 1\n", "too few arc descriptors")]
    #[case("p min 2 1\na 1 2 0 x 1\n", "malformed upper bound")]
    fn malformed_lines_fail_fast(#[case] text: &str, #[case] needle: &str) {
        let err = parse(text).unwrap_err();
        assert!(err.to_string().contains(needle), "{err} missing {needle}");
    }

    #[test]
    fn writes_dimacs_with_one_based_names() {
        let cs2 = parse(
            "p min 3 2\n\
             n 1 4\n\
             n 3 -4\n\
             a 1 2 0 4 1\n\
             a 2 3 0 4 2\n",
        )
        .unwrap();
        let mut out = Vec::new();
        cs2.write(&mut out, FileFormat::Dimacs).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("p min 3 2\n"));
        assert!(text.contains("a\t1\t2\t0\t4\t1"));
        assert!(text.contains("a\t2\t3\t0\t4\t2"));
        assert!(text.contains("n\t1\t4"));
        assert!(text.contains("n\t3\t-4"));
    }

    #[test]
    fn closed_arcs_are_left_out_of_the_output() {
        let mut cs2 = parse(
            "p min 2 2\n\
             a 1 2 0 4 1\n\
             a 1 2 0 4 9\n",
        )
        .unwrap();
        cs2.close_arc(1).unwrap();
        let mut out = Vec::new();
        cs2.write(&mut out, FileFormat::Dimacs).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("p min 2 1\n"));
        assert!(!text.contains("\t9"));
    }

    #[test]
    fn mps_has_rows_columns_and_bounds() {
        let cs2 = parse(
            "p min 2 1\n\
             n 1 2\n\
             n 2 -2\n\
             a 1 2 0 4 3\n",
        )
        .unwrap();
        let mut out = Vec::new();
        cs2.write(&mut out, FileFormat::Mps).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("ROWS\n N  obj\n E  c0\n E  c1\n"));
        assert!(text.contains(" x0\tobj\t3\tc0\t-1\n x0\tc1\t1\n"));
        assert!(text.contains("    rhs\tc0\t-2\n"));
        assert!(text.contains(" UP bnd x0 4\n"));
        assert!(text.ends_with("ENDATA\n"));
    }

    #[test]
    fn fixed_mps_keeps_the_column_widths() {
        let cs2 = parse("p min 2 1\na 1 2 0 4 3\n").unwrap();
        let mut out = Vec::new();
        cs2.write(&mut out, FileFormat::FixedMps).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("    x0        obj       3"));
        assert!(text.contains(" UP bnd       x0        4"));
    }

    #[test]
    fn round_trip_preserves_the_instance() {
        let mut first = parse(
            "p min 4 5\n\
             n 1 4\n\
             n 4 -4\n\
             a 1 2 0 3 1\n\
             a 1 3 0 3 2\n\
             a 2 4 0 3 1\n\
             a 3 4 0 3 1\n\
             a 2 3 0 2 0\n",
        )
        .unwrap();
        let mut out = Vec::new();
        first.write(&mut out, FileFormat::Dimacs).unwrap();
        let mut second: Cs2<i64, i64> = Cs2::default();
        second.load_dimacs(out.as_slice()).unwrap();
        assert_eq!(second.num_nodes(), 4);
        assert_eq!(second.num_arcs(), 5);
        assert_eq!(first.solve().unwrap(), Status::Optimal);
        assert_eq!(second.solve().unwrap(), Status::Optimal);
        assert_eq!(first.get_fo(), second.get_fo());
        assert_eq!(first.get_fo(), 9);
    }
}
