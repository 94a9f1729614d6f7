mod support;

use std::collections::BTreeSet;

use taskgate::mention::{parse_mentions, resolve_mentions};
use taskgate::notification::preference::resolve;
use taskgate::notification::{
    Channel, ChannelDecision, NotificationCategory, NotificationPreference, NotificationType,
    PreferenceResolver,
};
use taskgate::store::MemoryStore;

use support::{seed, CAROL, DAVE};

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[test]
fn mention_ids_are_unique_and_only_from_wellformed_tokens() {
    let body = "@[Carol](u-9) @[Carol again](u-9) @[Dave](u-42) \
                @Dave @[broken](u 1) [x](u-7) @[](u-8) @[Eve](u_5)";
    assert_eq!(parse_mentions(body), set(&["u-9", "u-42"]));
}

#[test]
fn plain_text_has_no_mentions() {
    for body in ["", "no mentions here", "email me at a@b.c", "@[open bracket"] {
        assert!(parse_mentions(body).is_empty(), "{body:?}");
    }
}

#[test]
fn mentions_inside_surrounding_text_are_found() {
    assert_eq!(
        parse_mentions("(cc @[Carol](u-9), thanks)\nand @[Dave](u-42)."),
        set(&["u-9", "u-42"])
    );
}

#[tokio::test]
async fn resolution_keeps_only_existing_users() {
    let store = MemoryStore::new();
    seed(&store).await;

    let users = resolve_mentions(&store, "@[Carol](u-9) @[Nobody](u-404) @[Dave](u-42)")
        .await
        .expect("resolve");
    let ids: BTreeSet<String> = users.into_iter().map(|user| user.id).collect();
    assert_eq!(ids, set(&[CAROL, DAVE]));

    assert!(resolve_mentions(&store, "nothing to see")
        .await
        .expect("empty")
        .is_empty());
}

#[test]
fn missing_preferences_enable_every_channel() {
    for kind in [
        NotificationType::TaskAssigned,
        NotificationType::TaskStatusChanged,
        NotificationType::TaskCommented,
        NotificationType::TaskDueSoon,
        NotificationType::TaskOverdue,
        NotificationType::InvitationAccepted,
        NotificationType::Mentioned,
        NotificationType::SecurityAlert,
    ] {
        assert_eq!(resolve(kind, None), ChannelDecision::new(true, true), "{kind}");
    }
}

#[test]
fn unmapped_kinds_are_in_app_only() {
    let prefs = NotificationPreference::new(CAROL);
    assert_eq!(
        resolve(NotificationType::Other, Some(&prefs)),
        ChannelDecision::new(true, false)
    );
    assert_eq!(
        resolve(NotificationType::Other, None),
        ChannelDecision::new(true, false)
    );
}

#[test]
fn security_alerts_ignore_preferences() {
    let mut prefs = NotificationPreference::new(CAROL);
    for category in NotificationCategory::ALL {
        for channel in Channel::ALL {
            prefs.set(category, channel, false);
        }
    }
    assert_eq!(
        resolve(NotificationType::SecurityAlert, Some(&prefs)),
        ChannelDecision::new(true, true)
    );
    let mentioned = resolve(NotificationType::Mentioned, Some(&prefs));
    assert!(mentioned.in_app);
}

#[test]
fn category_switches_map_to_channels() {
    let mut prefs = NotificationPreference::new(CAROL);
    prefs.set(NotificationCategory::TaskDue, Channel::Email, false);
    prefs.set(NotificationCategory::TaskStatus, Channel::InApp, false);

    assert_eq!(
        resolve(NotificationType::TaskOverdue, Some(&prefs)),
        ChannelDecision::new(true, false)
    );
    assert_eq!(
        resolve(NotificationType::TaskDueSoon, Some(&prefs)),
        ChannelDecision::new(true, false)
    );
    assert_eq!(
        resolve(NotificationType::TaskStatusChanged, Some(&prefs)),
        ChannelDecision::new(false, true)
    );
    assert_eq!(
        resolve(NotificationType::TaskAssigned, Some(&prefs)),
        ChannelDecision::new(true, true)
    );
}

#[test]
fn mention_email_follows_comment_switch_without_bypass() {
    let mut prefs = NotificationPreference::new(CAROL);
    prefs.set(NotificationCategory::TaskComment, Channel::Email, false);

    let strict = PreferenceResolver {
        mentions_bypass_email_preference: false,
    };
    assert_eq!(
        strict.resolve(NotificationType::Mentioned, Some(&prefs)),
        ChannelDecision::new(true, false)
    );
    assert_eq!(
        PreferenceResolver::default().resolve(NotificationType::Mentioned, Some(&prefs)),
        ChannelDecision::new(true, true)
    );
}
