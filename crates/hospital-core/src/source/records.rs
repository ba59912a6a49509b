//! Raw CSV row shapes and their coercion into typed entities.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::Table;
use crate::coerce;
use crate::error::RowParseError;
use crate::model::{Hospital, Patient, Payer, Physician, Review, Visit};

/// A CSV row as read from its source, before any type coercion.
pub trait SourceRecord: DeserializeOwned {
    type Parsed;

    const TABLE: Table;

    /// Best-effort business id, used to identify the row in issue reports.
    fn key(&self) -> Option<i64>;

    fn parse(self) -> Result<Self::Parsed, RowParseError>;
}

/// A visit together with the foreign keys and billing fields of its row.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitRow {
    pub visit: Visit,
    pub patient_id: i64,
    pub hospital_id: i64,
    pub physician_id: i64,
    pub payer_id: Option<i64>,
    pub billing_amount: Option<f64>,
}

/// A review together with the visit it was written about.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRow {
    pub review: Review,
    pub visit_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct HospitalCsv {
    hospital_id: String,
    hospital_name: String,
    hospital_state: String,
}

impl SourceRecord for HospitalCsv {
    type Parsed = Hospital;
    const TABLE: Table = Table::Hospitals;

    fn key(&self) -> Option<i64> {
        self.hospital_id.trim().parse().ok()
    }

    fn parse(self) -> Result<Hospital, RowParseError> {
        Ok(Hospital {
            id: coerce::integer("hospital_id", &self.hospital_id)?,
            name: self.hospital_name,
            state_name: self.hospital_state,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PayerCsv {
    payer_id: String,
    payer_name: String,
}

impl SourceRecord for PayerCsv {
    type Parsed = Payer;
    const TABLE: Table = Table::Payers;

    fn key(&self) -> Option<i64> {
        self.payer_id.trim().parse().ok()
    }

    fn parse(self) -> Result<Payer, RowParseError> {
        Ok(Payer {
            id: coerce::integer("payer_id", &self.payer_id)?,
            name: self.payer_name,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PhysicianCsv {
    physician_id: String,
    physician_name: String,
    physician_dob: String,
    physician_grad_year: String,
    medical_school: String,
    salary: String,
}

impl SourceRecord for PhysicianCsv {
    type Parsed = Physician;
    const TABLE: Table = Table::Physicians;

    fn key(&self) -> Option<i64> {
        self.physician_id.trim().parse().ok()
    }

    fn parse(self) -> Result<Physician, RowParseError> {
        Ok(Physician {
            id: coerce::integer("physician_id", &self.physician_id)?,
            name: self.physician_name,
            dob: coerce::date("physician_dob", &self.physician_dob)?,
            grad_year: self.physician_grad_year,
            school: self.medical_school,
            salary: coerce::float("salary", &self.salary)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PatientCsv {
    patient_id: String,
    patient_name: String,
    patient_sex: String,
    patient_dob: String,
    patient_blood_type: String,
}

impl SourceRecord for PatientCsv {
    type Parsed = Patient;
    const TABLE: Table = Table::Patients;

    fn key(&self) -> Option<i64> {
        self.patient_id.trim().parse().ok()
    }

    fn parse(self) -> Result<Patient, RowParseError> {
        Ok(Patient {
            id: coerce::integer("patient_id", &self.patient_id)?,
            name: self.patient_name,
            sex: self.patient_sex,
            dob: coerce::date("patient_dob", &self.patient_dob)?,
            blood_type: self.patient_blood_type,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VisitCsv {
    visit_id: String,
    patient_id: String,
    hospital_id: String,
    physician_id: String,
    #[serde(default)]
    payer_id: String,
    room_number: String,
    admission_type: String,
    date_of_admission: String,
    test_results: String,
    visit_status: String,
    chief_complaint: String,
    treatment_description: String,
    primary_diagnosis: String,
    #[serde(default)]
    discharge_date: String,
    #[serde(default)]
    billing_amount: String,
}

impl SourceRecord for VisitCsv {
    type Parsed = VisitRow;
    const TABLE: Table = Table::Visits;

    fn key(&self) -> Option<i64> {
        self.visit_id.trim().parse().ok()
    }

    fn parse(self) -> Result<VisitRow, RowParseError> {
        let visit = Visit {
            id: coerce::integer("visit_id", &self.visit_id)?,
            room_number: coerce::integer("room_number", &self.room_number)?,
            admission_type: self.admission_type,
            admission_date: coerce::date("date_of_admission", &self.date_of_admission)?,
            test_results: self.test_results,
            status: self.visit_status,
            chief_complaint: self.chief_complaint,
            treatment_description: self.treatment_description,
            diagnosis: self.primary_diagnosis,
            discharge_date: coerce::optional_date("discharge_date", &self.discharge_date)?,
        };
        Ok(VisitRow {
            visit,
            patient_id: coerce::integer("patient_id", &self.patient_id)?,
            hospital_id: coerce::integer("hospital_id", &self.hospital_id)?,
            physician_id: coerce::integer("physician_id", &self.physician_id)?,
            payer_id: coerce::optional_integer("payer_id", &self.payer_id)?,
            billing_amount: coerce::optional_float("billing_amount", &self.billing_amount)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewCsv {
    review_id: String,
    visit_id: String,
    review: String,
    patient_name: String,
    physician_name: String,
    hospital_name: String,
}

impl SourceRecord for ReviewCsv {
    type Parsed = ReviewRow;
    const TABLE: Table = Table::Reviews;

    fn key(&self) -> Option<i64> {
        self.review_id.trim().parse().ok()
    }

    fn parse(self) -> Result<ReviewRow, RowParseError> {
        Ok(ReviewRow {
            review: Review {
                id: coerce::integer("review_id", &self.review_id)?,
                text: self.review,
                patient_name: self.patient_name,
                physician_name: self.physician_name,
                hospital_name: self.hospital_name,
            },
            visit_id: coerce::integer("visit_id", &self.visit_id)?,
        })
    }
}
