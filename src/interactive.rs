//! Interactive list: pick a message to mark it read

use std::fmt;

use crate::app::Popup;
use crate::error::{PriorityError, Result};
use crate::models::Message;
use crate::render::format_message_line;

/// One entry in the review picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewChoice {
    MarkRead { position: usize, message: Message },
    Done,
}

impl fmt::Display for ReviewChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewChoice::MarkRead { position, message } => {
                write!(f, "{}", format_message_line(*position, message))
            }
            ReviewChoice::Done => write!(f, "Done"),
        }
    }
}

/// Picker options for a list, in display order, followed by `Done`
pub fn review_choices(messages: &[Message]) -> Vec<ReviewChoice> {
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| ReviewChoice::MarkRead {
            position: index + 1,
            message: message.clone(),
        })
        .chain(std::iter::once(ReviewChoice::Done))
        .collect()
}

/// Prompt until the user picks `Done`, the list empties, or the prompt is cancelled.
/// Returns how many messages were marked read.
pub async fn run_review(popup: &Popup) -> Result<usize> {
    let mut marked = 0;

    loop {
        let messages = popup.saved_messages().await;
        if messages.is_empty() {
            println!("Nothing left to review.");
            return Ok(marked);
        }

        let choices = review_choices(&messages);
        let selected = tokio::task::spawn_blocking(move || {
            inquire::Select::new("Mark as read:", choices)
                .with_page_size(15)
                .prompt()
        })
        .await
        .map_err(|e| PriorityError::StateError(format!("Review prompt failed: {}", e)))?;

        match selected {
            Ok(ReviewChoice::MarkRead { message, .. }) => {
                popup.on_mark_read(&message.id).await?;
                marked += 1;
            }
            Ok(ReviewChoice::Done) => return Ok(marked),
            Err(inquire::InquireError::OperationCanceled)
            | Err(inquire::InquireError::OperationInterrupted) => return Ok(marked),
            Err(e) => {
                return Err(PriorityError::StateError(format!(
                    "Review prompt failed: {}",
                    e
                )))
            }
        }
    }
}
