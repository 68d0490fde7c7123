use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatusResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictionResponse {
    pub predicted_label: String,
    pub confidence: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_uses_snake_case_keys() {
        let response = PredictionResponse {
            predicted_label: "A".into(),
            confidence: 0.5,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["predicted_label"], "A");
        assert_eq!(value["confidence"], 0.5);
    }

    #[test]
    fn error_body_has_single_field() {
        let body: ErrorResponse = serde_json::from_str(r#"{"error":"No file selected"}"#).unwrap();
        assert_eq!(body.error, "No file selected");
    }
}
