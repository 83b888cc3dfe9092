//! Property tests for line classification and pending-queue ordering

use parlor::pending::PendingQueues;
use parlor::protocol::{is_exit_line, parse_line, Command, Input};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_non_slash_lines_are_chat(line in "[^/\\s][^\\n]{0,64}") {
        prop_assert_eq!(parse_line(&line), Input::Chat(line.trim().to_string()));
    }

    #[test]
    fn test_slash_lines_are_commands(word in "[a-zA-Z]{1,12}", arg in "[a-z0-9 ]{0,16}") {
        let line = format!("/{} {}", word, arg);
        prop_assert!(matches!(parse_line(&line), Input::Command(_)));
    }

    #[test]
    fn test_command_words_ignore_case(upper in proptest::bool::ANY) {
        let line = if upper { "/ROOMS" } else { "/rooms" };
        prop_assert_eq!(parse_line(line), Input::Command(Command::Rooms));
    }

    #[test]
    fn test_chat_target_uppercased(name in "[a-z]{1,10}") {
        let expected = Command::Chat(Some(name.to_uppercase()));
        prop_assert_eq!(parse_line(&format!("/chat {}", name)), Input::Command(expected));
    }

    #[test]
    fn test_only_exact_goodbye_exits(suffix in "[a-z]{1,8}") {
        prop_assert!(is_exit_line("goodbye"));
        let with_suffix = format!("goodbye{}", suffix);
        prop_assert!(!is_exit_line(&with_suffix));
    }

    #[test]
    fn test_pending_queue_is_fifo(names in proptest::collection::vec("[A-Z]{1,6}", 0..20)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        let drained = runtime.block_on(async {
            let pending = PendingQueues::new();
            for name in &names {
                pending.enqueue("TARGET", name).await;
            }
            let mut drained = Vec::new();
            while let Some(name) = pending.take_head("TARGET").await {
                drained.push(name);
            }
            drained
        });

        prop_assert_eq!(drained, names);
    }
}
