//! Collection form
//!
//! Seven numeric readings entered by the operator before a collection run:
//! five taste-intensity axes, a quality score and a dilution percentage.

use crate::error::{WizardError, WizardResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Form field names, matching the backend payload keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    TasteSweet,
    TasteSalty,
    TasteBitter,
    TasteSour,
    TasteUmami,
    Quality,
    Dilution,
}

impl FormField {
    pub const ALL: [FormField; 7] = [
        FormField::TasteSweet,
        FormField::TasteSalty,
        FormField::TasteBitter,
        FormField::TasteSour,
        FormField::TasteUmami,
        FormField::Quality,
        FormField::Dilution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::TasteSweet => "taste_sweet",
            FormField::TasteSalty => "taste_salty",
            FormField::TasteBitter => "taste_bitter",
            FormField::TasteSour => "taste_sour",
            FormField::TasteUmami => "taste_umami",
            FormField::Quality => "quality",
            FormField::Dilution => "dilution",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormField {
    type Err = WizardError;

    /// Accepts payload keys (`taste_sweet`) and short taste names (`sweet`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let key = key.strip_prefix("taste_").unwrap_or(&key);
        match key {
            "sweet" => Ok(FormField::TasteSweet),
            "salty" => Ok(FormField::TasteSalty),
            "bitter" => Ok(FormField::TasteBitter),
            "sour" => Ok(FormField::TasteSour),
            "umami" => Ok(FormField::TasteUmami),
            "quality" => Ok(FormField::Quality),
            "dilution" => Ok(FormField::Dilution),
            _ => Err(WizardError::InvalidInput(format!("Unknown form field: {}", s))),
        }
    }
}

/// Operator-entered readings, all zero until edited
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionForm {
    pub taste_sweet: f64,
    pub taste_salty: f64,
    pub taste_bitter: f64,
    pub taste_sour: f64,
    pub taste_umami: f64,
    pub quality: f64,
    pub dilution: f64,
}

impl CollectionForm {
    pub fn get(&self, field: FormField) -> f64 {
        match field {
            FormField::TasteSweet => self.taste_sweet,
            FormField::TasteSalty => self.taste_salty,
            FormField::TasteBitter => self.taste_bitter,
            FormField::TasteSour => self.taste_sour,
            FormField::TasteUmami => self.taste_umami,
            FormField::Quality => self.quality,
            FormField::Dilution => self.dilution,
        }
    }

    pub fn set(&mut self, field: FormField, value: f64) {
        let slot = match field {
            FormField::TasteSweet => &mut self.taste_sweet,
            FormField::TasteSalty => &mut self.taste_salty,
            FormField::TasteBitter => &mut self.taste_bitter,
            FormField::TasteSour => &mut self.taste_sour,
            FormField::TasteUmami => &mut self.taste_umami,
            FormField::Quality => &mut self.quality,
            FormField::Dilution => &mut self.dilution,
        };
        *slot = value;
    }

    /// Coerce raw input to a number and store it
    ///
    /// Rejected input leaves the field unchanged.
    pub fn set_from_input(&mut self, field: FormField, input: &str) -> WizardResult<f64> {
        let value = coerce_numeric(input).ok_or_else(|| {
            WizardError::InvalidInput(format!("{} must be numeric, got {:?}", field, input))
        })?;
        self.set(field, value);
        Ok(value)
    }
}

/// Blank input is zero; anything else must parse to a finite number
pub fn coerce_numeric(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}
