//! Extraction prompt construction.

use chrono::{DateTime, Datelike, Utc, Weekday};

/// Build the extraction system prompt with the current date interpolated.
///
/// The date matters: "hours_today" depends on which weekday the model
/// thinks it is.
pub fn extraction_system_prompt(now: DateTime<Utc>) -> String {
    let weekday = weekday_name(now.weekday());
    let month = month_name(now.month());
    format!(
        r#"You extract structured food pantry information from scraped webpage content.

Today is {weekday}, {month} {day}, {year}.

The content may contain several pages of the same site concatenated
together, separated by "---" lines that name the source URL of the
section that follows.

Respond with a single JSON object with exactly these fields:

- "status": one of "OPEN", "CLOSED", "WAITLIST", "UNKNOWN". OPEN if the
  pantry is actively serving, CLOSED if temporarily or permanently closed,
  WAITLIST if they mention limited capacity or waiting lists, UNKNOWN only
  if the page has no relevant information at all.
- "hours_notes": the full weekly operating schedule, e.g.
  "Mon-Fri 9am-5pm, Sat 10am-2pm". Include every day and time mentioned.
  If not found, use "Not listed on website".
- "hours_today": today's specific hours based on the schedule, e.g.
  "9am-5pm". If a schedule is listed but today is not on it, use
  "Closed today". If no schedule is found, use "Not listed".
- "eligibility_rules": array of ALL eligibility requirements mentioned,
  e.g. "Must live in Fulton County", "Photo ID required",
  "One visit per month". If none are mentioned, use
  ["Open to all - no restrictions listed"].
- "is_id_required": true if the text mentions needing ID, photo
  identification, a license, proof of address, or any documentation to
  receive food; false otherwise.
- "residency_req": specific geographic requirement like
  "Fulton County residents", or null if open to everyone.
- "special_notes": temporary closures, holiday schedules, "arrive early",
  capacity limits - or null if nothing noteworthy.
- "confidence": integer 1-10 for how much pantry-specific information the
  page had. 1 means a generic site with no pantry details, 5 some mention
  of food programs, 9-10 a dedicated pantry page with hours and rules.

Do not invent information that is not in the content. If the content is
empty or unrelated to food assistance, use status "UNKNOWN", confidence
1 or 2, is_id_required false, and the default eligibility list.

Respond with raw JSON only: the first character of your response must be
{{ and the last must be }}. No markdown fences, no commentary."#,
        weekday = weekday,
        month = month,
        day = now.day(),
        year = now.year(),
    )
}

/// The user message wrapping the scraped markdown.
pub fn extraction_user_prompt(markdown: &str) -> String {
    format!(
        "Extract structured food pantry information from this scraped webpage content:\n\n{}",
        markdown
    )
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn prompt_interpolates_date() {
        let date = Utc.with_ymd_and_hms(2025, 7, 4, 12, 0, 0).unwrap();
        let prompt = extraction_system_prompt(date);
        assert!(prompt.contains("Friday, July 4, 2025"));
    }

    #[test]
    fn prompt_demands_json() {
        let prompt = extraction_system_prompt(Utc::now());
        assert!(prompt.contains("raw JSON only"));
        assert!(prompt.contains("\"confidence\""));
        assert!(prompt.contains("\"eligibility_rules\""));
    }
}
