//! Fixed prompts sent to the inference service.

use chrono::NaiveDate;

pub const EXTRACTION_PROMPT: &str = r#"
You are a medical document specialist analyzing a vaccination card. Extract ALL details including:
1. PATIENT INFORMATION:
   - Full name (exact spelling)
   - Date of birth (YYYY-MM-DD format)
   - Patient ID/Health number if present

2. VACCINATION HISTORY:
   - For EACH vaccine entry:
     * Vaccine name (official name)
     * Date administered (YYYY-MM-DD)

3. UPCOMING VACCINES:
   - Any mentioned future vaccines
   - Recommended due dates

Return STRICT JSON format (don't include any other text) with this structure:
{
    "patient_info": {
        "name": "",
        "dob": "",
        "patient_id": ""
    },
    "vaccines_received": [
        {
            "name": "",
            "date": ""
        }
    ],
    "due_vaccines": [
        {
            "name": "",
            "due_date": ""
        }
    ]
}
"#;

/// Ask for 2-3 precautions for one vaccine, as `{"precautions": [...]}`.
pub fn build_precautions_prompt(vaccine_name: &str) -> String {
    format!(
        r#"
Provide exactly 2-3 important precautions for someone about to receive a {vaccine_name} vaccine.
Return as a JSON array only:
{{
    "precautions": []
}}
"#
    )
}

/// Chat prompt: the record as pretty JSON, the question, and today's date.
pub fn build_answer_prompt(record_json: &str, question: &str, today: NaiveDate) -> String {
    format!(
        "Based on this vaccination data: {record_json}\n\n\
         Answer this question: {question}\n\n\
         Be concise and factual. Current date is {}",
        today.format("%Y-%m-%d")
    )
}
