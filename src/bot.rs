// Bot Adapter - chat messages in, confirmation or hint out
//
// The core (`BotAdapter::handle`) knows nothing about the chat network.
// The Telegram webhook types below map an inbound Update onto it and turn
// the reply into a `sendMessage` call returned in the webhook response.

use crate::ledger::Ledger;
use crate::parser::Grammar;
use crate::record::{Record, Source, RIEL};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

const RIEL_WORD: &str = "រៀល";

/// Converts chat text into ledger appends
#[derive(Debug, Clone)]
pub struct BotAdapter {
    ledger: Arc<Ledger>,
    grammar: Grammar,
}

impl BotAdapter {
    pub fn new(ledger: Arc<Ledger>, grammar: Grammar) -> Self {
        BotAdapter { ledger, grammar }
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// Reply to `/start`
    pub fn greeting(&self) -> String {
        format!(
            "សួស្តី 🙏 បញ្ចូលការលក់ ដោយប្រើ៖\n\n`{}`",
            self.grammar.hint()
        )
    }

    /// Handle one inbound text message
    ///
    /// Returns `None` for commands the bot does not answer. Blocks on the
    /// ledger write; async callers should run it on a blocking thread.
    pub fn handle(&self, text: &str) -> Option<String> {
        let text = text.trim();

        if let Some(command) = text.strip_prefix('/') {
            // "/start@shop_bot extra" → "start"
            let name = command
                .split(|c: char| c == '@' || c.is_whitespace())
                .next()
                .unwrap_or_default();
            return match name {
                "start" | "help" => Some(self.greeting()),
                _ => {
                    debug!(command = name, "ignoring unknown command");
                    None
                }
            };
        }

        let record = match self.grammar.parse(text, Source::Bot) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "rejected bot message");
                return Some(format!("❌ សូមប្រើទម្រង់: {}", e.hint()));
            }
        };

        let reply = confirmation(&record);
        match self.ledger.append(record) {
            Ok(()) => Some(reply),
            Err(e) => {
                error!(error = %e, "bot sale not saved");
                Some("⚠️ មិនអាចរក្សាទុកការលក់បានទេ សូមព្យាយាមម្តងទៀត".to_string())
            }
        }
    }

    /// Handle a Telegram update, producing the webhook reply if any
    pub fn handle_update(&self, update: &Update) -> Option<SendMessage> {
        let message = update.message.as_ref()?;
        let text = message.text.as_deref()?;

        self.handle(text).map(|reply| SendMessage {
            method: "sendMessage",
            chat_id: message.chat.id,
            text: reply,
            reply_to_message_id: Some(message.message_id),
        })
    }
}

/// Confirmation text for a saved record
pub fn confirmation(record: &Record) -> String {
    let unit = match record.currency.as_deref() {
        Some(RIEL) => format!(" {}", RIEL_WORD),
        Some(other) => format!(" {}", other),
        None => String::new(),
    };

    match record.qty {
        Some(qty) => format!(
            "✅ បានរក្សាទុក: {} x {} = {}{}",
            record.item, qty, record.total, unit
        ),
        None => format!("✅ បានរក្សាទុក: {} = {}{}", record.item, record.total, unit),
    }
}

// ============================================================================
// TELEGRAM WEBHOOK TYPES
// ============================================================================

/// Inbound update (only the fields we read)
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Bot API method call returned as the webhook response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendMessage {
    pub method: &'static str,
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Amount;
    use tempfile::{tempdir, TempDir};

    fn adapter(grammar: Grammar) -> (TempDir, BotAdapter) {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(dir.path().join("sales.json")).unwrap());
        (dir, BotAdapter::new(ledger, grammar))
    }

    #[test]
    fn test_start_command_greets_with_hint() {
        let (_dir, bot) = adapter(Grammar::ItemQtyPrice);

        let reply = bot.handle("/start").unwrap();
        assert!(reply.contains("`Item, Qty, Price`"));

        assert_eq!(bot.handle("/start@shop_bot"), Some(bot.greeting()));
    }

    #[test]
    fn test_unknown_command_is_silent() {
        let (_dir, bot) = adapter(Grammar::ItemQtyPrice);

        assert_eq!(bot.handle("/stats"), None);
        assert!(bot.ledger.is_empty());
    }

    #[test]
    fn test_valid_sale_is_saved_and_confirmed() {
        let (_dir, bot) = adapter(Grammar::ItemQtyPrice);

        let reply = bot.handle("Apple, 5, 2000").unwrap();

        assert_eq!(reply, "✅ បានរក្សាទុក: Apple x 5 = 10000 រៀល");
        let all = bot.ledger.list_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].total, Amount::Whole(10000));
        assert_eq!(all[0].source, Source::Bot);
    }

    #[test]
    fn test_malformed_sale_gets_hint_and_no_append() {
        let (_dir, bot) = adapter(Grammar::ItemQtyPrice);

        let reply = bot.handle("Apple").unwrap();

        assert_eq!(reply, "❌ សូមប្រើទម្រង់: Item, Qty, Price");
        assert!(bot.ledger.is_empty());
    }

    #[test]
    fn test_item_amount_confirmation_has_no_currency() {
        let (_dir, bot) = adapter(Grammar::ItemAmount);

        let reply = bot.handle("coffee, 2.5").unwrap();

        assert_eq!(reply, "✅ បានរក្សាទុក: coffee = 2.5");
    }

    #[test]
    fn test_storage_failure_is_reported() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("store");
        let ledger = Arc::new(Ledger::open(store.join("sales.json")).unwrap());
        let bot = BotAdapter::new(Arc::clone(&ledger), Grammar::ItemPrice);
        std::fs::remove_dir_all(&store).unwrap();

        let reply = bot.handle("Apple 5000").unwrap();

        assert!(reply.starts_with("⚠️"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_update_produces_send_message() {
        let (_dir, bot) = adapter(Grammar::ItemPrice);
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 42,
                "chat": { "id": 7, "type": "private" },
                "text": "Apple 5000"
            }
        }))
        .unwrap();

        let call = bot.handle_update(&update).unwrap();

        assert_eq!(call.method, "sendMessage");
        assert_eq!(call.chat_id, 7);
        assert_eq!(call.reply_to_message_id, Some(42));
        assert_eq!(call.text, "✅ បានរក្សាទុក: Apple = 5000 រៀល");
    }

    #[test]
    fn test_update_without_text_is_ignored() {
        let (_dir, bot) = adapter(Grammar::ItemPrice);
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 2,
            "message": { "message_id": 1, "chat": { "id": 7 } }
        }))
        .unwrap();

        assert!(bot.handle_update(&update).is_none());
    }
}
