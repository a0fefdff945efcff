//! Typed itinerary and chat reply models
//!
//! Venue tags (`[VENUE]**Name**|URL[/VENUE]`) and link tags inside text
//! fields are opaque and pass through untouched.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Clock times such as `9:00 AM`, `14:30` or `9:00 AM - 11:00 AM`
static HOUR_BASED_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[0-9]{1,2}:[0-9]{2}").expect("time pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedItinerary {
    pub title: String,
    pub days: Vec<Day>,
    #[serde(default)]
    pub booking_suggestions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Day {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default, alias = "dailyTip")]
    pub insider_tip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub time: String,
    pub description: String,
}

/// A structural problem found by [`ResolvedItinerary::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleIssue {
    NoDays,
    DayWithoutActivities { day: usize },
    MissingTime { day: usize, activity: usize },
    NonClockTime { day: usize, activity: usize, time: String },
}

impl fmt::Display for ScheduleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleIssue::NoDays => write!(f, "itinerary has no days"),
            ScheduleIssue::DayWithoutActivities { day } => {
                write!(f, "day {} has no activities", day)
            }
            ScheduleIssue::MissingTime { day, activity } => {
                write!(f, "day {} activity {} has no time", day, activity)
            }
            ScheduleIssue::NonClockTime {
                day,
                activity,
                time,
            } => write!(
                f,
                "day {} activity {} has a non clock time '{}'",
                day, activity, time
            ),
        }
    }
}

impl ResolvedItinerary {
    /// Check the schedule shape; day and activity numbers are 1-based
    pub fn validate(&self) -> Vec<ScheduleIssue> {
        if self.days.is_empty() {
            return vec![ScheduleIssue::NoDays];
        }

        let mut issues = Vec::new();
        for (d, day) in self.days.iter().enumerate() {
            let day_no = d + 1;
            if day.activities.is_empty() {
                issues.push(ScheduleIssue::DayWithoutActivities { day: day_no });
                continue;
            }
            for (a, activity) in day.activities.iter().enumerate() {
                let time = activity.time.trim();
                if time.is_empty() {
                    issues.push(ScheduleIssue::MissingTime {
                        day: day_no,
                        activity: a + 1,
                    });
                } else if !HOUR_BASED_TIME.is_match(time) {
                    issues.push(ScheduleIssue::NonClockTime {
                        day: day_no,
                        activity: a + 1,
                        time: time.to_string(),
                    });
                }
            }
        }
        issues
    }
}

/// Structured reply of the conversational endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatReply {
    Chat { message: String },
    Refinement { message: String },
    Itinerary(ResolvedItinerary),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn activity(time: &str) -> Activity {
        Activity {
            time: time.to_string(),
            description: "Walk".to_string(),
        }
    }

    fn itinerary(days: Vec<Vec<Activity>>) -> ResolvedItinerary {
        ResolvedItinerary {
            title: "Trip".to_string(),
            days: days
                .into_iter()
                .map(|activities| Day {
                    title: String::new(),
                    activities,
                    insider_tip: String::new(),
                })
                .collect(),
            booking_suggestions: String::new(),
        }
    }

    #[test]
    fn test_well_formed_schedule_has_no_issues() {
        let it = itinerary(vec![vec![activity("9:00 AM"), activity("14:30")]]);
        assert!(it.validate().is_empty());
    }

    #[test]
    fn test_time_ranges_count_as_clock_times() {
        let it = itinerary(vec![vec![activity("9:00 AM - 11:00 AM")]]);
        assert!(it.validate().is_empty());
    }

    #[test]
    fn test_vague_and_missing_times_are_reported() {
        let it = itinerary(vec![
            vec![activity("Morning"), activity("")],
            vec![],
        ]);
        assert_eq!(
            it.validate(),
            vec![
                ScheduleIssue::NonClockTime {
                    day: 1,
                    activity: 1,
                    time: "Morning".to_string()
                },
                ScheduleIssue::MissingTime { day: 1, activity: 2 },
                ScheduleIssue::DayWithoutActivities { day: 2 },
            ]
        );
    }

    #[test]
    fn test_empty_itinerary_reports_no_days() {
        assert_eq!(itinerary(vec![]).validate(), vec![ScheduleIssue::NoDays]);
    }

    #[test]
    fn test_optional_fields_default_and_daily_tip_alias() {
        let parsed: ResolvedItinerary = serde_json::from_value(json!({
            "title": "Oslo",
            "days": [{"activities": [{"description": "Fjord cruise"}], "dailyTip": "Bring a jacket"}]
        }))
        .unwrap();
        assert_eq!(parsed.booking_suggestions, "");
        assert_eq!(parsed.days[0].insider_tip, "Bring a jacket");
        assert_eq!(parsed.days[0].activities[0].time, "");
    }

    #[test]
    fn test_serializes_with_camel_case_names() {
        let out = serde_json::to_value(itinerary(vec![vec![activity("9:00 AM")]])).unwrap();
        assert!(out.get("bookingSuggestions").is_some());
        assert!(out["days"][0].get("insiderTip").is_some());
    }

    #[test]
    fn test_chat_reply_variants_by_type_tag() {
        let chat: ChatReply =
            serde_json::from_value(json!({"type": "chat", "message": "Hi!"})).unwrap();
        assert_eq!(
            chat,
            ChatReply::Chat {
                message: "Hi!".to_string()
            }
        );

        let plan: ChatReply = serde_json::from_value(json!({
            "type": "itinerary",
            "title": "Rome",
            "days": []
        }))
        .unwrap();
        assert!(matches!(plan, ChatReply::Itinerary(ref it) if it.title == "Rome"));

        assert!(serde_json::from_value::<ChatReply>(json!({"type": "poem"})).is_err());
    }
}
