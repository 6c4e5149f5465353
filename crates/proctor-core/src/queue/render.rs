//! Paged keyboard rendering for queue views.
//!
//! The participant ordering is a hard contract, not cosmetics: status
//! governs grouping (people being checked first, skipped last), total
//! points break ties within a group, and the last name is the final
//! tiebreak so equal-rank entries never visibly reorder between
//! re-renders.

use proctor_types::EventId;
use proctor_types::keyboard::{CallbackData, Keyboard, KeyboardButton};
use proctor_types::queue::QueueParticipant;

/// Paging parameters for list keyboards.
#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    /// Buttons per page.
    pub page_size: usize,
    /// Buttons per row.
    pub line_size: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            page_size: 6,
            line_size: 1,
        }
    }
}

/// One selectable row of a paged list: what the user sees, and the id
/// that comes back when they press it.
#[derive(Debug, Clone)]
pub struct PagedItem {
    pub id: String,
    pub label: String,
}

/// Build one page of a selectable list plus prev/next navigation.
///
/// Item buttons carry `<callback_name>:<item id>`; the navigation row
/// carries `page:<callback_name>:<page>` so a press can be routed back
/// to the same list.
pub fn paged_keyboard(
    items: &[PagedItem],
    callback_name: &str,
    page: usize,
    settings: RenderSettings,
) -> Keyboard {
    let mut keyboard = Keyboard::new();
    let start = page * settings.page_size;
    let end = usize::min(start + settings.page_size, items.len());

    let mut row = Vec::new();
    for item in items.iter().take(end).skip(start) {
        row.push(KeyboardButton::new(
            item.label.clone(),
            CallbackData::new(callback_name, item.id.clone()).to_string(),
        ));
        if row.len() == settings.line_size.max(1) {
            keyboard.push_row(std::mem::take(&mut row));
        }
    }
    keyboard.push_row(row);

    let mut nav = Vec::new();
    if page > 0 {
        nav.push(KeyboardButton::new(
            "\u{25C0}\u{FE0F}",
            CallbackData::with_extra("page", callback_name, (page - 1).to_string()).to_string(),
        ));
    }
    if end < items.len() {
        nav.push(KeyboardButton::new(
            "\u{25B6}\u{FE0F}",
            CallbackData::with_extra("page", callback_name, (page + 1).to_string()).to_string(),
        ));
    }
    keyboard.push_row(nav);

    keyboard
}

/// Sort a participant list by the rendering contract.
pub fn sort_participants(participants: &mut [QueueParticipant]) {
    participants.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// Group color marker shown before the name; unknown colors render bare.
fn color_marker(color: &str) -> &'static str {
    match color {
        "#07FF00" => "\u{1F7E2} ",
        "#1151B6" => "\u{1F535} ",
        "#E68800" | "#B67911" => "\u{1F7E4} ",
        _ => "",
    }
}

/// The visible label for one participant button.
pub fn participant_row(participant: &QueueParticipant) -> String {
    format!(
        "{}{} {} {}",
        color_marker(&participant.color),
        participant.last_name,
        participant.first_name,
        participant.status.emoji()
    )
}

/// Render one page of a queue event's participant list.
pub fn queue_keyboard(
    participants: &[QueueParticipant],
    event_id: EventId,
    page: usize,
    settings: RenderSettings,
) -> Keyboard {
    let mut sorted: Vec<QueueParticipant> = participants.to_vec();
    sort_participants(&mut sorted);

    let items: Vec<PagedItem> = sorted
        .iter()
        .map(|p| PagedItem {
            id: p.user_id.to_string(),
            label: participant_row(p),
        })
        .collect();

    paged_keyboard(&items, &format!("queue_{event_id}"), page, settings)
}
