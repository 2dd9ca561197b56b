//! XMILE reader.
//!
//! Pull-parser state machine over quick-xml events. Element names are
//! matched by local name so both namespaced and plain documents parse.
//! Only the first `<model>` is read; XMILE modules are not supported.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use sysdyn_common::error::{Result, SdError};
use sysdyn_common::expr::{BinaryOp, Expr};
use sysdyn_common::ir::{ModelIr, VarKind, Variable};
use sysdyn_common::names::canonical;

use crate::parser::parse_expression;

#[derive(Debug, Clone, Copy, PartialEq)]
enum RawKind {
    Stock,
    Flow,
    Aux,
}

#[derive(Debug)]
struct RawVar {
    display_name: String,
    kind: RawKind,
    eqn: Option<String>,
    inflows: Vec<String>,
    outflows: Vec<String>,
    units: Option<String>,
    doc: Option<String>,
}

/// Parse an XMILE document. `fallback_name` is used when the header
/// carries no model name.
pub fn parse_xmile(fallback_name: &str, src: &str) -> Result<ModelIr> {
    let mut reader = Reader::from_str(src);
    reader.config_mut().trim_text(true);

    let mut model_name: Option<String> = None;
    let mut specs_start: Option<f64> = None;
    let mut specs_stop: Option<f64> = None;
    let mut specs_dt: Option<f64> = None;
    let mut specs_saveper: Option<f64> = None;
    let mut raw_vars: Vec<RawVar> = Vec::new();

    // State machine flags
    let mut in_header = false;
    let mut in_sim_specs = false;
    let mut models_seen = 0usize;
    let mut current: Option<RawVar> = None;
    let mut field: Option<&'static str> = None;
    let mut text_buf = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = local_name(e);
                match local.as_str() {
                    "header" => in_header = true,
                    "sim_specs" => in_sim_specs = true,
                    "model" => models_seen += 1,
                    "stock" | "flow" | "aux" if models_seen == 1 => {
                        let kind = match local.as_str() {
                            "stock" => RawKind::Stock,
                            "flow" => RawKind::Flow,
                            _ => RawKind::Aux,
                        };
                        current = Some(RawVar {
                            display_name: name_attribute(e)?,
                            kind,
                            eqn: None,
                            inflows: Vec::new(),
                            outflows: Vec::new(),
                            units: None,
                            doc: None,
                        });
                    }
                    "name" if in_header => field = Some("name"),
                    "start" | "stop" | "dt" | "savestep" | "save_step" if in_sim_specs => {
                        field = Some(match local.as_str() {
                            "start" => "start",
                            "stop" => "stop",
                            "dt" => "dt",
                            _ => "saveper",
                        });
                    }
                    "eqn" | "inflow" | "outflow" | "units" | "doc" if current.is_some() => {
                        field = Some(match local.as_str() {
                            "eqn" => "eqn",
                            "inflow" => "inflow",
                            "outflow" => "outflow",
                            "units" => "units",
                            _ => "doc",
                        });
                    }
                    _ => {}
                }
                if field.is_some() {
                    text_buf.clear();
                }
            }
            Ok(Event::Text(ref e)) => {
                if field.is_some() {
                    let text = e
                        .unescape()
                        .map_err(|err| SdError::Xml(err.to_string()))?;
                    text_buf.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => {
                let local = local_name_end(e.name().as_ref());
                match local.as_str() {
                    "header" => in_header = false,
                    "sim_specs" => in_sim_specs = false,
                    "stock" | "flow" | "aux" => {
                        if let Some(var) = current.take() {
                            raw_vars.push(var);
                        }
                        field = None;
                    }
                    _ => {
                        if let Some(active) = field.take() {
                            let text = text_buf.trim().to_string();
                            match active {
                                "name" => model_name = Some(text),
                                "start" => specs_start = parse_number(&text, "start")?,
                                "stop" => specs_stop = parse_number(&text, "stop")?,
                                "dt" => specs_dt = parse_number(&text, "dt")?,
                                "saveper" => specs_saveper = parse_number(&text, "savestep")?,
                                other => {
                                    if let Some(ref mut var) = current {
                                        match other {
                                            "eqn" => var.eqn = Some(text),
                                            "inflow" => var.inflows.push(text),
                                            "outflow" => var.outflows.push(text),
                                            "units" => var.units = Some(text),
                                            "doc" => var.doc = Some(text),
                                            _ => {}
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(SdError::Xml(err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if models_seen == 0 {
        return Err(SdError::Xml("no <model> element found".to_string()));
    }

    let name = model_name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| fallback_name.to_string());
    let mut ir = ModelIr::new(name);
    if let Some(v) = specs_start {
        ir.specs.start = v;
    }
    if let Some(v) = specs_stop {
        ir.specs.stop = v;
    }
    if let Some(v) = specs_dt {
        ir.specs.dt = v;
    }
    ir.specs.saveper = specs_saveper;

    for raw in raw_vars {
        ir.insert(lower_variable(raw)?)?;
    }
    ir.check_references()?;
    debug!(model = %ir.name, variables = ir.variables.len(), "parsed XMILE model");
    Ok(ir)
}

fn lower_variable(raw: RawVar) -> Result<Variable> {
    let name = canonical(&raw.display_name);
    if name.is_empty() {
        return Err(SdError::Xml("variable with empty name".to_string()));
    }
    let eqn = raw.eqn.as_deref().filter(|s| !s.is_empty()).ok_or_else(|| {
        SdError::Xml(format!("variable `{}` has no <eqn>", raw.display_name))
    })?;

    let kind = match raw.kind {
        RawKind::Stock => VarKind::Stock {
            initial: parse_expression(eqn)?,
            net_flow: net_flow_expr(&raw.inflows, &raw.outflows),
        },
        RawKind::Flow => VarKind::Flow { equation: parse_expression(eqn)? },
        RawKind::Aux => VarKind::Aux { equation: parse_expression(eqn)? },
    };
    Ok(Variable {
        name,
        display_name: raw.display_name,
        kind,
        units: raw.units,
        doc: raw.doc,
    })
}

/// `sum(inflows) - sum(outflows)`, or `0` for an isolated stock.
fn net_flow_expr(inflows: &[String], outflows: &[String]) -> Expr {
    let mut expr: Option<Expr> = None;
    for inflow in inflows {
        let var = Expr::Var(canonical(inflow));
        expr = Some(match expr {
            None => var,
            Some(acc) => Expr::Binary(BinaryOp::Add, Box::new(acc), Box::new(var)),
        });
    }
    for outflow in outflows {
        let var = Expr::Var(canonical(outflow));
        expr = Some(match expr {
            None => Expr::Unary(sysdyn_common::expr::UnaryOp::Neg, Box::new(var)),
            Some(acc) => Expr::Binary(BinaryOp::Sub, Box::new(acc), Box::new(var)),
        });
    }
    expr.unwrap_or(Expr::Num(0.0))
}

fn parse_number(text: &str, what: &str) -> Result<Option<f64>> {
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<f64>()
        .map(Some)
        .map_err(|_| SdError::Xml(format!("<{what}> is not a number: `{text}`")))
}

fn local_name(e: &BytesStart) -> String {
    local_name_end(e.name().as_ref())
}

fn local_name_end(qname: &[u8]) -> String {
    let local = match qname.iter().rposition(|&b| b == b':') {
        Some(pos) => &qname[pos + 1..],
        None => qname,
    };
    String::from_utf8_lossy(local).to_ascii_lowercase()
}

fn name_attribute(e: &BytesStart) -> Result<String> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| SdError::Xml(err.to_string()))?;
        if attr.key.as_ref() == b"name" {
            let value = attr
                .unescape_value()
                .map_err(|err| SdError::Xml(err.to_string()))?;
            return Ok(value.into_owned());
        }
    }
    Err(SdError::Xml("variable element without a name attribute".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEACUP_XMILE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<xmile version="1.0" xmlns="http://docs.oasis-open.org/xmile/ns/XMILE/v1.0">
  <header>
    <name>Teacup</name>
  </header>
  <sim_specs>
    <start>0</start>
    <stop>30</stop>
    <dt>0.125</dt>
  </sim_specs>
  <model>
    <variables>
      <stock name="Teacup Temperature">
        <eqn>180</eqn>
        <outflow>Heat Loss to Room</outflow>
        <units>degrees</units>
      </stock>
      <flow name="Heat Loss to Room">
        <eqn>(Teacup Temperature - Room Temperature) / Characteristic Time</eqn>
      </flow>
      <aux name="Room Temperature">
        <eqn>70</eqn>
      </aux>
      <aux name="Characteristic Time">
        <eqn>10</eqn>
      </aux>
    </variables>
  </model>
</xmile>
"#;

    #[test]
    fn parses_teacup_model() {
        let ir = parse_xmile("fallback", TEACUP_XMILE).unwrap();
        assert_eq!(ir.name, "Teacup");
        assert_eq!(ir.specs.stop, 30.0);
        assert_eq!(ir.specs.dt, 0.125);
        assert_eq!(ir.variables.len(), 4);

        let stock = ir.get("teacup_temperature").unwrap();
        match &stock.kind {
            VarKind::Stock { initial, net_flow } => {
                assert_eq!(*initial, Expr::Num(180.0));
                // single outflow lowers to a negated reference
                assert_eq!(
                    *net_flow,
                    Expr::Unary(
                        sysdyn_common::expr::UnaryOp::Neg,
                        Box::new(Expr::Var("heat_loss_to_room".into()))
                    )
                );
            }
            other => panic!("expected stock, got {other:?}"),
        }
        assert!(matches!(ir.get("heat_loss_to_room").unwrap().kind, VarKind::Flow { .. }));
    }

    #[test]
    fn inflows_and_outflows_combine() {
        let expr = net_flow_expr(
            &["births".to_string()],
            &["deaths".to_string(), "emigration".to_string()],
        );
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(
                    BinaryOp::Sub,
                    Box::new(Expr::Var("births".into())),
                    Box::new(Expr::Var("deaths".into())),
                )),
                Box::new(Expr::Var("emigration".into())),
            )
        );
    }

    #[test]
    fn missing_eqn_is_an_error() {
        let src = r#"<xmile><model><variables>
            <aux name="broken"></aux>
        </variables></model></xmile>"#;
        let err = parse_xmile("m", src).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn missing_model_element_is_an_error() {
        let src = "<xmile><header><name>empty</name></header></xmile>";
        assert!(parse_xmile("m", src).is_err());
    }

    #[test]
    fn unknown_flow_reference_is_an_error() {
        let src = r#"<xmile><model><variables>
            <stock name="s"><eqn>1</eqn><inflow>ghost</inflow></stock>
        </variables></model></xmile>"#;
        let err = parse_xmile("m", src).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let src = "<xmile><model></wrong></model></xmile>";
        assert!(matches!(parse_xmile("m", src), Err(SdError::Xml(_))));
    }
}
