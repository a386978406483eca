//! Intrinsic expressions.
//!
//! Property values that are only known at apply time (ARNs, DNS names,
//! availability zones) are expressed with the provisioning engine's
//! intrinsic functions rather than resolved here.

use serde::{Serialize, Serializer};
use serde_json::{Value, json};

use crate::LogicalId;

/// A property value, either a literal or an intrinsic function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A plain string.
    Literal(String),
    /// `Ref` to a resource, parameter or pseudo parameter.
    Ref(String),
    /// `Fn::GetAtt` on a resource.
    GetAtt(LogicalId, String),
    /// `Fn::Join` with a delimiter.
    Join(String, Vec<Expr>),
    /// `Fn::Join` over an expression that is itself a list.
    JoinList(String, Box<Expr>),
    /// `Fn::Sub` template.
    Sub(String),
    /// `Fn::Base64`.
    Base64(Box<Expr>),
    /// `Fn::Select` from a list expression.
    Select(u32, Box<Expr>),
    /// `Fn::GetAZs` for the current region.
    GetAzs,
}

impl Expr {
    /// Reference a resource or parameter.
    pub fn reference(id: &LogicalId) -> Self {
        Expr::Ref(id.as_str().to_string())
    }

    /// Reference a pseudo parameter such as `AWS::Region`.
    pub fn pseudo(name: &str) -> Self {
        Expr::Ref(format!("AWS::{}", name))
    }

    pub fn get_att(id: &LogicalId, attribute: &str) -> Self {
        Expr::GetAtt(id.clone(), attribute.to_string())
    }

    pub fn join(delimiter: &str, parts: Vec<Expr>) -> Self {
        Expr::Join(delimiter.to_string(), parts)
    }

    /// Join a list-valued attribute such as a zone's name servers.
    pub fn join_list(delimiter: &str, list: Expr) -> Self {
        Expr::JoinList(delimiter.to_string(), Box::new(list))
    }

    pub fn base64(inner: Expr) -> Self {
        Expr::Base64(Box::new(inner))
    }

    /// Select the n-th availability zone of the current region.
    pub fn availability_zone(index: u32) -> Self {
        Expr::Select(index, Box::new(Expr::GetAzs))
    }

    /// Return the literal value, if this expression is a plain string.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Expr::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// Render as a JSON value in template syntax.
    pub fn to_value(&self) -> Value {
        match self {
            Expr::Literal(s) => Value::String(s.clone()),
            Expr::Ref(name) => json!({ "Ref": name }),
            Expr::GetAtt(id, attribute) => json!({ "Fn::GetAtt": [id.as_str(), attribute] }),
            Expr::Join(delimiter, parts) => {
                let parts: Vec<Value> = parts.iter().map(Expr::to_value).collect();
                json!({ "Fn::Join": [delimiter, parts] })
            }
            Expr::JoinList(delimiter, list) => json!({ "Fn::Join": [delimiter, list.to_value()] }),
            Expr::Sub(template) => json!({ "Fn::Sub": template }),
            Expr::Base64(inner) => json!({ "Fn::Base64": inner.to_value() }),
            Expr::Select(index, list) => json!({ "Fn::Select": [index, list.to_value()] }),
            Expr::GetAzs => json!({ "Fn::GetAZs": "" }),
        }
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Literal(s.to_string())
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(s)
    }
}

impl From<&LogicalId> for Expr {
    fn from(id: &LogicalId) -> Self {
        Expr::reference(id)
    }
}
