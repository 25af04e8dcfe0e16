use std::collections::BTreeMap;
use std::fmt;

use crate::classify::InstructionKind;

/// Statically resolved argument value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer or float literal, with any unary sign applied.
    Number(f64),
    /// String literal (adjacent literals concatenated).
    Text(String),
    /// `True` / `False`.
    Bool(bool),
    /// `None`.
    None,
}

impl Literal {
    /// Numeric value. Booleans count as 0/1.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Literal::Number(n) => Some(*n),
            Literal::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// String value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Literal::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Text(s) => write!(f, "{s:?}"),
            Literal::Bool(true) => f.write_str("True"),
            Literal::Bool(false) => f.write_str("False"),
            Literal::None => f.write_str("None"),
        }
    }
}

/// One extracted call.
///
/// Each argument lands either in `fields` (a literal) or in `unresolved`
/// (its source text), never both. Positional arguments are named after the
/// kind's parameter list; surplus or unclassified ones become `arg0`, `arg1`...
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Enclosing routine.
    pub source_routine: String,
    /// 1-based line of the call name.
    pub line: usize,
    /// Classified kind.
    pub kind: InstructionKind,
    /// Call name as written, e.g. `motor_pair.move_for_degrees`.
    pub call: String,
    /// Arguments with a literal value.
    pub fields: BTreeMap<String, Literal>,
    /// Arguments that could not be resolved statically, with their source text.
    pub unresolved: BTreeMap<String, String>,
}

impl Instruction {
    /// Numeric value of field `name`.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Literal::as_number)
    }

    /// String value of field `name`.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Literal::as_text)
    }

    /// Whether `name` was given, literal or not.
    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.unresolved.contains_key(name)
    }

    /// Whether every argument resolved to a literal.
    pub fn is_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {} {}(", self.source_routine, self.line, self.kind, self.call)?;
        let mut first = true;
        for (name, value) in &self.fields {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        for (name, text) in &self.unresolved {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{name}=<{text}>")?;
            first = false;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let mut fields = BTreeMap::new();
        fields.insert("heading".to_string(), Literal::Number(-90.0));
        fields.insert("port".to_string(), Literal::Text("C".to_string()));
        let mut unresolved = BTreeMap::new();
        unresolved.insert("condition".to_string(), "lambda: done()".to_string());
        let instr = Instruction {
            source_routine: "run1_main".to_string(),
            line: 4,
            kind: InstructionKind::HeadingFollow,
            call: "gyro_follow".to_string(),
            fields,
            unresolved,
        };
        assert_eq!(instr.number("heading"), Some(-90.0));
        assert_eq!(instr.text("port"), Some("C"));
        assert_eq!(instr.number("port"), None);
        assert!(instr.has("condition"));
        assert!(!instr.has("gain"));
        assert!(!instr.is_resolved());
        assert_eq!(
            instr.to_string(),
            "run1_main:4 heading_follow gyro_follow(heading=-90, port=\"C\", condition=<lambda: done()>)"
        );
    }

    #[test]
    fn test_bool_as_number() {
        assert_eq!(Literal::Bool(true).as_number(), Some(1.0));
        assert_eq!(Literal::None.as_number(), None);
    }
}
