//! Graph domain model: node kinds, relationship kinds and the six entities.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::coerce;
use crate::error::{EtlError, EtlResult, RowParseError};

/// Value type of a declared node or edge attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Float,
    Text,
}

/// A declared attribute of a node or relationship kind (the `id` key excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    pub name: &'static str,
    pub ty: ValueType,
    pub optional: bool,
}

impl Attribute {
    const fn required(name: &'static str, ty: ValueType) -> Self {
        Self { name, ty, optional: false }
    }

    const fn optional(name: &'static str, ty: ValueType) -> Self {
        Self { name, ty, optional: true }
    }

    /// Coerce user-supplied text (e.g. a query filter) to this attribute's type.
    pub fn coerce(&self, raw: &str) -> Result<PropertyValue, RowParseError> {
        Ok(match self.ty {
            ValueType::Integer => PropertyValue::Integer(coerce::integer(self.name, raw)?),
            ValueType::Float => PropertyValue::Float(coerce::float(self.name, raw)?),
            ValueType::Text => PropertyValue::Text(raw.to_string()),
        })
    }
}

use ValueType::{Float, Integer, Text};

const HOSPITAL_ATTRS: &[Attribute] = &[
    Attribute::required("name", Text),
    Attribute::required("state_name", Text),
];
const PAYER_ATTRS: &[Attribute] = &[Attribute::required("name", Text)];
const PHYSICIAN_ATTRS: &[Attribute] = &[
    Attribute::required("name", Text),
    Attribute::required("dob", Text),
    Attribute::required("grad_year", Text),
    Attribute::required("school", Text),
    Attribute::required("salary", Float),
];
const PATIENT_ATTRS: &[Attribute] = &[
    Attribute::required("name", Text),
    Attribute::required("sex", Text),
    Attribute::required("dob", Text),
    Attribute::required("blood_type", Text),
];
const VISIT_ATTRS: &[Attribute] = &[
    Attribute::required("room_number", Integer),
    Attribute::required("admission_type", Text),
    Attribute::required("admission_date", Text),
    Attribute::required("test_results", Text),
    Attribute::required("status", Text),
    Attribute::required("chief_complaint", Text),
    Attribute::required("treatment_description", Text),
    Attribute::required("diagnosis", Text),
    Attribute::optional("discharge_date", Text),
];
const REVIEW_ATTRS: &[Attribute] = &[
    Attribute::required("text", Text),
    Attribute::required("patient_name", Text),
    Attribute::required("physician_name", Text),
    Attribute::required("hospital_name", Text),
];
const COVERED_BY_ATTRS: &[Attribute] = &[
    Attribute::optional("service_date", Text),
    Attribute::optional("billing_amount", Float),
];

/// The six node labels of the hospital graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Hospital,
    Payer,
    Physician,
    Patient,
    Visit,
    Review,
}

impl NodeKind {
    pub const ALL: [NodeKind; 6] = [
        NodeKind::Hospital,
        NodeKind::Payer,
        NodeKind::Physician,
        NodeKind::Patient,
        NodeKind::Visit,
        NodeKind::Review,
    ];

    /// The Neo4j node label for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Hospital => "Hospital",
            NodeKind::Payer => "Payer",
            NodeKind::Physician => "Physician",
            NodeKind::Patient => "Patient",
            NodeKind::Visit => "Visit",
            NodeKind::Review => "Review",
        }
    }

    /// Declared attributes, in write order.
    pub fn attributes(&self) -> &'static [Attribute] {
        match self {
            NodeKind::Hospital => HOSPITAL_ATTRS,
            NodeKind::Payer => PAYER_ATTRS,
            NodeKind::Physician => PHYSICIAN_ATTRS,
            NodeKind::Patient => PATIENT_ATTRS,
            NodeKind::Visit => VISIT_ATTRS,
            NodeKind::Review => REVIEW_ATTRS,
        }
    }

    /// Look up a declared attribute. `id` resolves to the integer key.
    pub fn attribute(&self, name: &str) -> Option<Attribute> {
        if name == "id" {
            return Some(Attribute::required("id", Integer));
        }
        self.attributes().iter().copied().find(|a| a.name == name)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for NodeKind {
    type Err = EtlError;

    /// Parse from string (case-insensitive, singular or plural).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let singular = lower.strip_suffix('s').unwrap_or(&lower);
        NodeKind::ALL
            .into_iter()
            .find(|k| k.label().to_lowercase() == singular)
            .ok_or_else(|| EtlError::invalid_query(format!("unknown node kind '{}'", s)))
    }
}

/// The six relationship types of the hospital graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelKind {
    #[serde(rename = "AT")]
    At,
    #[serde(rename = "WRITES")]
    Writes,
    #[serde(rename = "TREATS")]
    Treats,
    #[serde(rename = "COVERED_BY")]
    CoveredBy,
    #[serde(rename = "HAS")]
    Has,
    #[serde(rename = "EMPLOYS")]
    Employs,
}

impl RelKind {
    pub const ALL: [RelKind; 6] = [
        RelKind::At,
        RelKind::Writes,
        RelKind::Treats,
        RelKind::CoveredBy,
        RelKind::Has,
        RelKind::Employs,
    ];

    /// The Neo4j relationship type.
    pub fn type_name(&self) -> &'static str {
        match self {
            RelKind::At => "AT",
            RelKind::Writes => "WRITES",
            RelKind::Treats => "TREATS",
            RelKind::CoveredBy => "COVERED_BY",
            RelKind::Has => "HAS",
            RelKind::Employs => "EMPLOYS",
        }
    }

    /// Source node kind.
    pub fn from_kind(&self) -> NodeKind {
        match self {
            RelKind::At | RelKind::Writes | RelKind::CoveredBy => NodeKind::Visit,
            RelKind::Treats => NodeKind::Physician,
            RelKind::Has => NodeKind::Patient,
            RelKind::Employs => NodeKind::Hospital,
        }
    }

    /// Target node kind.
    pub fn to_kind(&self) -> NodeKind {
        match self {
            RelKind::At => NodeKind::Hospital,
            RelKind::Writes => NodeKind::Review,
            RelKind::Treats | RelKind::Has => NodeKind::Visit,
            RelKind::CoveredBy => NodeKind::Payer,
            RelKind::Employs => NodeKind::Physician,
        }
    }

    /// Declared edge properties.
    pub fn attributes(&self) -> &'static [Attribute] {
        match self {
            RelKind::CoveredBy => COVERED_BY_ATTRS,
            _ => &[],
        }
    }
}

impl fmt::Display for RelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A typed property value as stored on a node or edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Null,
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Integer(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Text(v) => f.write_str(v),
            PropertyValue::Null => f.write_str("-"),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Integer(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(PropertyValue::Null)
    }
}

/// Named property values of a single node or edge, `id` excluded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, PropertyValue>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<PropertyValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn text(&self, name: &str) -> EtlResult<String> {
        match self.get(name) {
            Some(PropertyValue::Text(s)) => Ok(s.clone()),
            other => Err(type_mismatch(name, "text", other)),
        }
    }

    pub fn opt_text(&self, name: &str) -> EtlResult<Option<String>> {
        match self.get(name) {
            None | Some(PropertyValue::Null) => Ok(None),
            _ => self.text(name).map(Some),
        }
    }

    pub fn integer(&self, name: &str) -> EtlResult<i64> {
        match self.get(name) {
            Some(PropertyValue::Integer(v)) => Ok(*v),
            other => Err(type_mismatch(name, "integer", other)),
        }
    }

    pub fn float(&self, name: &str) -> EtlResult<f64> {
        match self.get(name) {
            Some(PropertyValue::Float(v)) => Ok(*v),
            Some(PropertyValue::Integer(v)) => Ok(*v as f64),
            other => Err(type_mismatch(name, "float", other)),
        }
    }

    pub fn opt_float(&self, name: &str) -> EtlResult<Option<f64>> {
        match self.get(name) {
            None | Some(PropertyValue::Null) => Ok(None),
            _ => self.float(name).map(Some),
        }
    }
}

fn type_mismatch(name: &str, expected: &str, found: Option<&PropertyValue>) -> EtlError {
    match found {
        None => EtlError::decode(format!("missing property '{}'", name)),
        Some(v) => EtlError::decode(format!("property '{}' is {:?}, expected {}", name, v, expected)),
    }
}

/// A node entity that can be written to and decoded from the graph.
pub trait Entity: Sized {
    const KIND: NodeKind;

    fn id(&self) -> i64;

    /// All declared attributes, `id` excluded.
    fn properties(&self) -> Properties;

    fn from_properties(id: i64, props: &Properties) -> EtlResult<Self>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: i64,
    pub name: String,
    pub state_name: String,
}

impl Entity for Hospital {
    const KIND: NodeKind = NodeKind::Hospital;

    fn id(&self) -> i64 {
        self.id
    }

    fn properties(&self) -> Properties {
        Properties::new()
            .with("name", self.name.as_str())
            .with("state_name", self.state_name.as_str())
    }

    fn from_properties(id: i64, props: &Properties) -> EtlResult<Self> {
        Ok(Self {
            id,
            name: props.text("name")?,
            state_name: props.text("state_name")?,
        })
    }
}

/// An insurance company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payer {
    pub id: i64,
    pub name: String,
}

impl Entity for Payer {
    const KIND: NodeKind = NodeKind::Payer;

    fn id(&self) -> i64 {
        self.id
    }

    fn properties(&self) -> Properties {
        Properties::new().with("name", self.name.as_str())
    }

    fn from_properties(id: i64, props: &Properties) -> EtlResult<Self> {
        Ok(Self {
            id,
            name: props.text("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Physician {
    pub id: i64,
    pub name: String,
    pub dob: String,
    pub grad_year: String,
    pub school: String,
    pub salary: f64,
}

impl Entity for Physician {
    const KIND: NodeKind = NodeKind::Physician;

    fn id(&self) -> i64 {
        self.id
    }

    fn properties(&self) -> Properties {
        Properties::new()
            .with("name", self.name.as_str())
            .with("dob", self.dob.as_str())
            .with("grad_year", self.grad_year.as_str())
            .with("school", self.school.as_str())
            .with("salary", self.salary)
    }

    fn from_properties(id: i64, props: &Properties) -> EtlResult<Self> {
        Ok(Self {
            id,
            name: props.text("name")?,
            dob: props.text("dob")?,
            grad_year: props.text("grad_year")?,
            school: props.text("school")?,
            salary: props.float("salary")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub sex: String,
    pub dob: String,
    pub blood_type: String,
}

impl Entity for Patient {
    const KIND: NodeKind = NodeKind::Patient;

    fn id(&self) -> i64 {
        self.id
    }

    fn properties(&self) -> Properties {
        Properties::new()
            .with("name", self.name.as_str())
            .with("sex", self.sex.as_str())
            .with("dob", self.dob.as_str())
            .with("blood_type", self.blood_type.as_str())
    }

    fn from_properties(id: i64, props: &Properties) -> EtlResult<Self> {
        Ok(Self {
            id,
            name: props.text("name")?,
            sex: props.text("sex")?,
            dob: props.text("dob")?,
            blood_type: props.text("blood_type")?,
        })
    }
}

/// A patient's stay at a hospital; the central fact of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: i64,
    pub room_number: i64,
    pub admission_type: String,
    pub admission_date: String,
    pub test_results: String,
    pub status: String,
    pub chief_complaint: String,
    pub treatment_description: String,
    pub diagnosis: String,
    pub discharge_date: Option<String>,
}

impl Entity for Visit {
    const KIND: NodeKind = NodeKind::Visit;

    fn id(&self) -> i64 {
        self.id
    }

    fn properties(&self) -> Properties {
        Properties::new()
            .with("room_number", self.room_number)
            .with("admission_type", self.admission_type.as_str())
            .with("admission_date", self.admission_date.as_str())
            .with("test_results", self.test_results.as_str())
            .with("status", self.status.as_str())
            .with("chief_complaint", self.chief_complaint.as_str())
            .with("treatment_description", self.treatment_description.as_str())
            .with("diagnosis", self.diagnosis.as_str())
            .with("discharge_date", self.discharge_date.clone())
    }

    fn from_properties(id: i64, props: &Properties) -> EtlResult<Self> {
        Ok(Self {
            id,
            room_number: props.integer("room_number")?,
            admission_type: props.text("admission_type")?,
            admission_date: props.text("admission_date")?,
            test_results: props.text("test_results")?,
            status: props.text("status")?,
            chief_complaint: props.text("chief_complaint")?,
            treatment_description: props.text("treatment_description")?,
            diagnosis: props.text("diagnosis")?,
            discharge_date: props.opt_text("discharge_date")?,
        })
    }
}

/// Free-text feedback attached to a visit, with denormalized names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub text: String,
    pub patient_name: String,
    pub physician_name: String,
    pub hospital_name: String,
}

impl Entity for Review {
    const KIND: NodeKind = NodeKind::Review;

    fn id(&self) -> i64 {
        self.id
    }

    fn properties(&self) -> Properties {
        Properties::new()
            .with("text", self.text.as_str())
            .with("patient_name", self.patient_name.as_str())
            .with("physician_name", self.physician_name.as_str())
            .with("hospital_name", self.hospital_name.as_str())
    }

    fn from_properties(id: i64, props: &Properties) -> EtlResult<Self> {
        Ok(Self {
            id,
            text: props.text("text")?,
            patient_name: props.text("patient_name")?,
            physician_name: props.text("physician_name")?,
            hospital_name: props.text("hospital_name")?,
        })
    }
}

/// A decoded node of any kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "label")]
pub enum GraphNode {
    Hospital(Hospital),
    Payer(Payer),
    Physician(Physician),
    Patient(Patient),
    Visit(Visit),
    Review(Review),
}

impl GraphNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            GraphNode::Hospital(_) => NodeKind::Hospital,
            GraphNode::Payer(_) => NodeKind::Payer,
            GraphNode::Physician(_) => NodeKind::Physician,
            GraphNode::Patient(_) => NodeKind::Patient,
            GraphNode::Visit(_) => NodeKind::Visit,
            GraphNode::Review(_) => NodeKind::Review,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            GraphNode::Hospital(n) => n.id,
            GraphNode::Payer(n) => n.id,
            GraphNode::Physician(n) => n.id,
            GraphNode::Patient(n) => n.id,
            GraphNode::Visit(n) => n.id,
            GraphNode::Review(n) => n.id,
        }
    }

    /// Short human-readable name for listings.
    pub fn display_name(&self) -> String {
        match self {
            GraphNode::Hospital(n) => n.name.clone(),
            GraphNode::Payer(n) => n.name.clone(),
            GraphNode::Physician(n) => n.name.clone(),
            GraphNode::Patient(n) => n.name.clone(),
            GraphNode::Visit(n) => format!("{} ({})", n.diagnosis, n.admission_date),
            GraphNode::Review(n) => n.text.chars().take(60).collect(),
        }
    }

    pub fn properties(&self) -> Properties {
        match self {
            GraphNode::Hospital(n) => n.properties(),
            GraphNode::Payer(n) => n.properties(),
            GraphNode::Physician(n) => n.properties(),
            GraphNode::Patient(n) => n.properties(),
            GraphNode::Visit(n) => n.properties(),
            GraphNode::Review(n) => n.properties(),
        }
    }

    /// Decode a node of `kind` from its stored properties.
    pub fn decode(kind: NodeKind, id: i64, props: &Properties) -> EtlResult<Self> {
        Ok(match kind {
            NodeKind::Hospital => GraphNode::Hospital(Hospital::from_properties(id, props)?),
            NodeKind::Payer => GraphNode::Payer(Payer::from_properties(id, props)?),
            NodeKind::Physician => GraphNode::Physician(Physician::from_properties(id, props)?),
            NodeKind::Patient => GraphNode::Patient(Patient::from_properties(id, props)?),
            NodeKind::Visit => GraphNode::Visit(Visit::from_properties(id, props)?),
            NodeKind::Review => GraphNode::Review(Review::from_properties(id, props)?),
        })
    }
}

/// A decoded edge: endpoint ids plus edge properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRecord {
    pub kind: RelKind,
    pub from_id: i64,
    pub to_id: i64,
    pub properties: Properties,
}
