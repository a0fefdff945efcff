//! Prompt assembly
//!
//! Pure functions of sanitized input and metadata. Inputs must already have
//! passed [`crate::intake::sanitize`]; conversation history is sanitized here
//! because it arrives as a list.

use serde::Deserialize;
use std::fmt::Write;

use crate::intake::{RequestMetadata, sanitize};

/// Number of most recent history entries included in chat prompts
pub const CHAT_HISTORY_WINDOW: usize = 6;

/// One prior message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatTurn {
    fn speaker(&self) -> &'static str {
        if self.role.eq_ignore_ascii_case("user") {
            "User"
        } else {
            "Assistant"
        }
    }
}

const MULTI_CITY_SECTION: &str = "\
Multi-city trip:
- Organize the days by city and make every transition between cities explicit
- On travel days give the transport option (airline, rail service or bus line), its duration and a rough cost
- Suggest arrival and departure times that leave room for sightseeing
- Mention how to get from the airport or station to the centre
- Keep arrival days lighter to allow for travel fatigue
- Add at least one city-specific tip per destination
";

const ITINERARY_SHAPE: &str = r#"{
  "title": "Trip title",
  "days": [
    {
      "title": "Day 1: Location",
      "activities": [
        {
          "time": "9:00 AM",
          "description": "Visit [VENUE]**Venue Name**|https://maps.google.com/?q=Venue+Name+City[/VENUE]. What to expect, how long to stay and one practical tip."
        }
      ],
      "insiderTip": "A specific, actionable local secret for this day's location."
    }
  ],
  "bookingSuggestions": "BOOKING_LINKS"
}"#;

/// Builds upstream prompts from sanitized input
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    affiliate_id: Option<String>,
}

impl PromptAssembler {
    pub fn new(affiliate_id: Option<String>) -> Self {
        Self {
            affiliate_id: affiliate_id.filter(|id| !id.trim().is_empty()),
        }
    }

    pub fn affiliate_id(&self) -> Option<&str> {
        self.affiliate_id.as_deref()
    }

    /// Full itinerary prompt for one sanitized request
    pub fn itinerary(&self, input: &str, metadata: &RequestMetadata) -> String {
        let mut prompt = String::from(
            "Create a travel itinerary and answer with a single JSON object.\n\n\
             Requirements:\n\
             - Use real venue names and give every activity a clock time (9:00 AM, not \"Morning\")\n\
             - Tag venues as [VENUE]**VenueName**|https://maps.google.com/?q=VenueName+City[/VENUE]\n\
             - Descriptions carry practical detail: what to expect, duration, cost range, booking tips\n\
             - When a single country is requested keep every destination inside that country\n\
             - Resolve ambiguous place names to the most famous location (\"Paris\" is Paris, France)\n",
        );

        if metadata.has_specific_dates {
            let _ = writeln!(
                prompt,
                "- Use the dates given ({}) in the day titles",
                metadata.found_dates.join(", ")
            );
        }
        if metadata.is_multi_city {
            prompt.push('\n');
            prompt.push_str(MULTI_CITY_SECTION);
        }

        prompt.push_str("\nReturn ONLY the JSON object, without markdown fences.\n\nJSON structure:\n");
        prompt.push_str(&ITINERARY_SHAPE.replace("BOOKING_LINKS", &self.booking_links()));
        prompt.push_str(
            "\n\nRules:\n\
             - 4 to 6 activities per day, fewer on travel days\n\
             - Every activity, including those on the last day, has a specific time\n\
             - Every day has an \"insiderTip\"\n\
             - Replace [DESTINATION] in bookingSuggestions with the main city of the trip\n",
        );

        let _ = write!(prompt, "\nUser's request: \"{}\"", input);
        prompt
    }

    /// Conversational prompt; `history` is sanitized and cut to the last
    /// [`CHAT_HISTORY_WINDOW`] entries, entries that fail sanitization are dropped
    pub fn chat(&self, latest: &str, history: &[ChatTurn]) -> String {
        let start = history.len().saturating_sub(CHAT_HISTORY_WINDOW);
        let context: Vec<String> = history[start..]
            .iter()
            .filter_map(|turn| {
                sanitize(&turn.content)
                    .ok()
                    .map(|content| format!("{}: {}", turn.speaker(), content))
            })
            .collect();
        let context = if context.is_empty() {
            "This is the start of a new conversation".to_string()
        } else {
            context.join("\n")
        };

        let mut prompt = String::from(
            "You are a travel planning assistant. You answer travel questions, \
             plan day-by-day itineraries and refine plans the user already has.\n\n",
        );
        let _ = writeln!(prompt, "Conversation so far:\n{}\n", context);
        let _ = writeln!(prompt, "Latest user message:\n\"{}\"\n", latest);

        prompt.push_str(
            "Always answer with one JSON object that has a \"type\" field:\n\
             - A full itinerary request (\"plan\", \"itinerary\", \"N days in\", \"trip to\") gets \
             {\"type\": \"itinerary\", ...} with the structure below\n\
             - A change to a plan already in the conversation gets \
             {\"type\": \"refinement\", \"message\": \"...\"}\n\
             - Anything else gets {\"type\": \"chat\", \"message\": \"...\"} using friendly Markdown\n\n\
             Itinerary structure:\n",
        );
        let shape = ITINERARY_SHAPE
            .replacen('{', "{\n  \"type\": \"itinerary\",", 1)
            .replace("BOOKING_LINKS", &self.booking_links());
        prompt.push_str(&shape);
        prompt.push_str("\n\nBe concise and keep [VENUE] tags on real venue names.");
        prompt
    }

    fn booking_links(&self) -> String {
        let tag = |param: &str| match &self.affiliate_id {
            Some(id) => format!("{}={}", param, id),
            None => String::new(),
        };
        let join = |base: &str, param: &str, rest: &str| {
            let aff = tag(param);
            match (aff.is_empty(), rest.is_empty()) {
                (true, true) => base.to_string(),
                (true, false) => format!("{}?{}", base, rest),
                (false, true) => format!("{}?{}", base, aff),
                (false, false) => format!("{}?{}&{}", base, aff, rest),
            }
        };

        format!(
            "### Flights\\nSearch flights to [DESTINATION]: [LINK]Skyscanner|{}[/LINK] or [LINK]Kiwi.com|{}[/LINK]\\n\\n\
             ### Hotels\\nBook hotels in [DESTINATION]: [LINK]Booking.com|{}[/LINK] or [LINK]Hotels.com|{}[/LINK]\\n\\n\
             ### Activities\\nFind tours in [DESTINATION]: [LINK]GetYourGuide|{}[/LINK] or [LINK]Viator|{}[/LINK]",
            join("https://www.skyscanner.net/", "associateid", ""),
            join("https://www.kiwi.com/deep", "affilid", ""),
            join("https://www.booking.com/searchresults.html", "aid", "ss=[DESTINATION]"),
            join("https://www.hotels.com/search.do", "affcid", "destination=[DESTINATION]"),
            join("https://www.getyourguide.com/s/", "partner_id", "q=[DESTINATION]"),
            join("https://www.viator.com/searchResults/all", "pid", "text=[DESTINATION]"),
        )
    }
}
