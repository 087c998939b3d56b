//! Input validation for actions.
//!
//! Field validators return `Err(message)`; callers collect them with
//! `ValidationErrorBuilder` so the first failure becomes the result message.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::db::{ClaimPayload, TeachingClaim, ThesisClaim, TransportClaim};

use super::error::{ApiError, ValidationErrorBuilder};

lazy_static! {
    /// Loose email shape check: local@domain.tld
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$"
    ).unwrap();

    /// Course codes such as "CS 101" or "MATH-220"
    static ref COURSE_CODE_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9][A-Za-z0-9 -]*[A-Za-z0-9]$"
    ).unwrap();
}

pub const MAX_HOURLY_RATE: f64 = 10_000.0;
pub const MAX_CONTACT_HOURS: f64 = 24.0;
pub const MAX_DISTANCE_KM: f64 = 5_000.0;
pub const MAX_AMOUNT: f64 = 100_000.0;
pub const MAX_REASON_LEN: usize = 500;

/// Validate a required free-text field by trimmed character count
pub fn validate_text(value: &str, label: &str, max: usize) -> Result<(), String> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(format!("{} is required", label));
    }
    if len > max {
        return Err(format!("{} is too long (max {} characters)", label, max));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    validate_text(name, "Name", 100)
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 12 {
        return Err("Password must be at least 12 characters".to_string());
    }
    if password.len() > 256 {
        return Err("Password is too long (max 256 characters)".to_string());
    }

    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if !has_uppercase {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    if !has_lowercase {
        return Err("Password must contain at least one lowercase letter".to_string());
    }
    if !has_digit {
        return Err("Password must contain at least one digit".to_string());
    }
    if !has_special {
        return Err("Password must contain at least one special character".to_string());
    }

    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

/// Validate a calendar date in `YYYY-MM-DD` form
pub fn validate_date(value: &str, label: &str) -> Result<(), String> {
    if value.len() != 10 || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        return Err(format!("{} must be a date in YYYY-MM-DD format", label));
    }
    Ok(())
}

pub fn validate_course_code(code: &str) -> Result<(), String> {
    let len = code.chars().count();
    if !(2..=20).contains(&len) {
        return Err("Course code must be between 2 and 20 characters".to_string());
    }
    if !COURSE_CODE_REGEX.is_match(code) {
        return Err("Course code may only contain letters, digits, spaces and dashes".to_string());
    }
    Ok(())
}

/// `min < value <= max`, rejecting NaN and infinities
fn positive_up_to(value: f64, label: &str, max: f64) -> Result<(), String> {
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("{} must be greater than 0", label));
    }
    if value > max {
        return Err(format!("{} must not exceed {}", label, max));
    }
    Ok(())
}

fn non_negative_up_to(value: f64, label: &str, max: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{} must not be negative", label));
    }
    if value > max {
        return Err(format!("{} must not exceed {}", label, max));
    }
    Ok(())
}

fn check_teaching(claim: &TeachingClaim, errors: &mut ValidationErrorBuilder) {
    errors
        .check("course_code", validate_course_code(&claim.course_code))
        .check("course_title", validate_text(&claim.course_title, "Course title", 200))
        .check("teaching_date", validate_date(&claim.teaching_date, "Teaching date"))
        .check(
            "contact_hours",
            positive_up_to(claim.contact_hours, "Contact hours", MAX_CONTACT_HOURS),
        )
        .check(
            "hourly_rate",
            positive_up_to(claim.hourly_rate, "Hourly rate", MAX_HOURLY_RATE),
        );
}

fn check_transport(claim: &TransportClaim, errors: &mut ValidationErrorBuilder) {
    errors
        .check("origin", validate_text(&claim.origin, "Origin", 200))
        .check("destination", validate_text(&claim.destination, "Destination", 200))
        .check("travel_date", validate_date(&claim.travel_date, "Travel date"))
        .check(
            "distance_km",
            positive_up_to(claim.distance_km, "Distance", MAX_DISTANCE_KM),
        )
        .check("fare", non_negative_up_to(claim.fare, "Fare", MAX_AMOUNT));

    if claim.origin.trim().eq_ignore_ascii_case(claim.destination.trim()) {
        errors.add("destination", "Destination must differ from origin");
    }
    if let Some(vehicle) = &claim.vehicle {
        if vehicle.chars().count() > 100 {
            errors.add("vehicle", "Vehicle is too long (max 100 characters)");
        }
    }
}

fn check_thesis(claim: &ThesisClaim, errors: &mut ValidationErrorBuilder) {
    errors
        .check("student_name", validate_text(&claim.student_name, "Student name", 200))
        .check("student_id", validate_text(&claim.student_id, "Student ID", 50))
        .check("thesis_title", validate_text(&claim.thesis_title, "Thesis title", 300))
        .check("amount", positive_up_to(claim.amount, "Amount", MAX_AMOUNT));
}

/// Range and format checks for a decoded claim payload
pub fn validate_claim_payload(payload: &ClaimPayload) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    match payload {
        ClaimPayload::Teaching(claim) => check_teaching(claim, &mut errors),
        ClaimPayload::Transport(claim) => check_transport(claim, &mut errors),
        ClaimPayload::Thesis(claim) => check_thesis(claim, &mut errors),
    }
    errors.finish()
}

pub fn validate_reason(reason: Option<&str>) -> Result<(), String> {
    match reason {
        Some(r) if r.chars().count() > MAX_REASON_LEN => Err(format!(
            "Reason is too long (max {} characters)",
            MAX_REASON_LEN
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SupervisionRole, ThesisDegree};

    fn teaching() -> TeachingClaim {
        TeachingClaim {
            course_code: "CS 101".to_string(),
            course_title: "Intro to Computing".to_string(),
            teaching_date: "2026-03-02".to_string(),
            contact_hours: 3.0,
            hourly_rate: 40.0,
        }
    }

    fn transport() -> TransportClaim {
        TransportClaim {
            origin: "Accra".to_string(),
            destination: "Kumasi".to_string(),
            travel_date: "2026-01-10".to_string(),
            distance_km: 250.0,
            fare: 120.0,
            vehicle: None,
        }
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ama@uni.edu.gh").is_ok());
        assert!(validate_email("first.last+claims@example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("Correct-Horse-42").is_ok());

        assert!(validate_password("Short1!").is_err());
        assert!(validate_password("alllowercase-42").is_err());
        assert!(validate_password("ALLUPPERCASE-42").is_err());
        assert!(validate_password("NoDigitsHere!!").is_err());
        assert!(validate_password("NoSpecials4242").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "claim_id").is_ok());
        assert!(validate_uuid("", "claim_id").is_err());
        assert!(validate_uuid("not-a-uuid", "claim_id").is_err());
    }

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2026-02-28", "Date").is_ok());
        assert!(validate_date("2026-02-30", "Date").is_err());
        assert!(validate_date("2026-2-3", "Date").is_err());
        assert!(validate_date("03/02/2026", "Date").is_err());
    }

    #[test]
    fn test_validate_course_code() {
        assert!(validate_course_code("CS 101").is_ok());
        assert!(validate_course_code("MATH-220").is_ok());

        assert!(validate_course_code("C").is_err());
        assert!(validate_course_code("CS_101").is_err());
        assert!(validate_course_code("-CS101").is_err());
        assert!(validate_course_code("ABCDEFGHIJKLMNOPQRSTU").is_err());
    }

    #[test]
    fn test_teaching_ranges() {
        assert!(validate_claim_payload(&ClaimPayload::Teaching(teaching())).is_ok());

        let mut claim = teaching();
        claim.contact_hours = 0.0;
        let err = validate_claim_payload(&ClaimPayload::Teaching(claim)).unwrap_err();
        assert_eq!(err.message(), "Contact hours must be greater than 0");

        let mut claim = teaching();
        claim.contact_hours = 24.5;
        assert!(validate_claim_payload(&ClaimPayload::Teaching(claim)).is_err());

        let mut claim = teaching();
        claim.hourly_rate = f64::NAN;
        assert!(validate_claim_payload(&ClaimPayload::Teaching(claim)).is_err());
    }

    #[test]
    fn test_transport_rules() {
        assert!(validate_claim_payload(&ClaimPayload::Transport(transport())).is_ok());

        let mut claim = transport();
        claim.fare = 0.0;
        assert!(validate_claim_payload(&ClaimPayload::Transport(claim)).is_ok());

        let mut claim = transport();
        claim.destination = " accra ".to_string();
        let err = validate_claim_payload(&ClaimPayload::Transport(claim)).unwrap_err();
        assert_eq!(err.message(), "Destination must differ from origin");

        let mut claim = transport();
        claim.fare = -1.0;
        assert!(validate_claim_payload(&ClaimPayload::Transport(claim)).is_err());
    }

    #[test]
    fn test_thesis_rules() {
        let claim = ThesisClaim {
            student_name: "K. Mensah".to_string(),
            student_id: "   ".to_string(),
            thesis_title: "Soil salinity".to_string(),
            degree: ThesisDegree::Masters,
            supervision_role: SupervisionRole::Examiner,
            amount: 500.0,
        };
        let err = validate_claim_payload(&ClaimPayload::Thesis(claim)).unwrap_err();
        assert_eq!(err.message(), "Student ID is required");
    }

    #[test]
    fn test_validate_reason() {
        assert!(validate_reason(None).is_ok());
        assert!(validate_reason(Some("Missing receipt")).is_ok());
        assert!(validate_reason(Some(&"x".repeat(501))).is_err());
    }
}
