//! Greeting new members. A join is a transition from "not in the group"
//! to "in the group"; restricted users count as present only while they
//! remain members.

use teloxide::prelude::*;
use teloxide::types::{ChatMemberKind, ChatMemberUpdated};
use tracing::info;

use crate::messages;

/// Presence of a user in the chat, as far as greeting logic cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    In,
    Restricted { is_member: bool },
    Out,
}

pub fn member_state(kind: &ChatMemberKind) -> MemberState {
    match kind {
        ChatMemberKind::Owner(_) | ChatMemberKind::Administrator(_) | ChatMemberKind::Member => {
            MemberState::In
        }
        ChatMemberKind::Restricted(restricted) => MemberState::Restricted {
            is_member: restricted.is_member,
        },
        ChatMemberKind::Left | ChatMemberKind::Banned(_) => MemberState::Out,
    }
}

fn is_present(state: MemberState) -> bool {
    matches!(state, MemberState::In | MemberState::Restricted { is_member: true })
}

/// Whether this status change means the user just joined.
pub fn became_member(old: MemberState, new: MemberState) -> bool {
    is_present(new) && !is_present(old)
}

pub async fn handle_chat_member(bot: &Bot, update: &ChatMemberUpdated) -> anyhow::Result<()> {
    let old = member_state(&update.old_chat_member.kind);
    let new = member_state(&update.new_chat_member.kind);
    if !became_member(old, new) {
        return Ok(());
    }
    let user = &update.new_chat_member.user;
    info!(user_id = user.id.0, chat = update.chat.id.0, "Greeting new member");
    bot.send_message(update.chat.id, messages::group_welcome(&user.first_name))
        .await?;
    Ok(())
}
