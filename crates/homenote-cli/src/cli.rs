//! Argument definitions

use clap::{value_parser, Arg, ArgAction, Command};
use homenote_client::AuthProvider;
use std::path::PathBuf;

/// Default config file, read from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "homenote.toml";

fn id_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .required(true)
        .value_parser(value_parser!(u64))
        .help(help)
}

/// Build the `homenote` command tree
#[must_use]
pub fn build_cli() -> Command {
    Command::new("homenote")
        .version(crate::VERSION)
        .about("Homenote rental contract, listing and home note client")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .default_value(DEFAULT_CONFIG_FILE)
                .value_parser(value_parser!(PathBuf))
                .help("Config file (TOML); ignored when missing"),
        )
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .global(true)
                .help("Backend origin, overriding config and environment"),
        )
        .arg(
            Arg::new("state-dir")
                .long("state-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding the session file"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging unless RUST_LOG is set"),
        )
        .subcommand(
            Command::new("login")
                .about("Exchange an OAuth authorization code for a session")
                .arg(
                    Arg::new("provider")
                        .long("provider")
                        .required(true)
                        .value_parser(|s: &str| s.parse::<AuthProvider>())
                        .help("kakao, naver or google"),
                )
                .arg(
                    Arg::new("code")
                        .long("code")
                        .required(true)
                        .help("Authorization code from the provider"),
                )
                .arg(
                    Arg::new("redirect-uri")
                        .long("redirect-uri")
                        .required(true)
                        .help("Redirect URI registered with the provider"),
                ),
        )
        .subcommand(Command::new("logout").about("End the session"))
        .subcommand(Command::new("me").about("Show the signed-in member"))
        .subcommand(
            Command::new("nickname")
                .about("Change the nickname")
                .arg(Arg::new("name").required(true).help("2 to 10 letters or digits")),
        )
        .subcommand(
            Command::new("lifestyles")
                .about("List lifestyle tags, or save a selection")
                .arg(
                    Arg::new("select")
                        .long("select")
                        .num_args(1..)
                        .value_parser(value_parser!(u64))
                        .help("Lifestyle ids to save"),
                ),
        )
        .subcommand(
            Command::new("listings")
                .about("Property listings")
                .subcommand_required(true)
                .subcommand(
                    Command::new("search")
                        .about("Search listings")
                        .arg(Arg::new("keyword").help("Search keyword"))
                        .arg(
                            Arg::new("page")
                                .long("page")
                                .default_value("0")
                                .value_parser(value_parser!(u32)),
                        )
                        .arg(
                            Arg::new("size")
                                .long("size")
                                .default_value("20")
                                .value_parser(value_parser!(u32)),
                        ),
                )
                .subcommand(
                    Command::new("show")
                        .about("Show one listing")
                        .arg(id_arg("id", "Listing id")),
                )
                .subcommand(
                    Command::new("bookmark")
                        .about("Toggle the bookmark on a listing")
                        .arg(id_arg("id", "Listing id")),
                ),
        )
        .subcommand(
            Command::new("recent")
                .about("Recent search keywords")
                .arg(
                    Arg::new("clear")
                        .long("clear")
                        .action(ArgAction::SetTrue)
                        .help("Forget all recent searches"),
                )
                .arg(
                    Arg::new("remove")
                        .long("remove")
                        .conflicts_with("clear")
                        .help("Forget one keyword"),
                ),
        )
        .subcommand(
            Command::new("contracts")
                .about("Easy contract analysis")
                .subcommand_required(true)
                .subcommand(
                    Command::new("submit")
                        .about("Upload contract pages and request analysis")
                        .arg(
                            Arg::new("files")
                                .required(true)
                                .num_args(1..)
                                .value_parser(value_parser!(PathBuf))
                                .help("PNG, JPEG, GIF or PDF files"),
                        )
                        .arg(
                            Arg::new("wait")
                                .long("wait")
                                .action(ArgAction::SetTrue)
                                .help("Wait for the result event"),
                        ),
                )
                .subcommand(Command::new("list").about("List submitted contracts"))
                .subcommand(
                    Command::new("show")
                        .about("Show one contract")
                        .arg(id_arg("id", "Contract id")),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a contract")
                        .arg(id_arg("id", "Contract id")),
                ),
        )
        .subcommand(
            Command::new("notes")
                .about("Home notes")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List home notes"))
                .subcommand(
                    Command::new("show")
                        .about("Show one note")
                        .arg(id_arg("id", "Note id")),
                )
                .subcommand(
                    Command::new("create")
                        .about("Create a note")
                        .arg(Arg::new("title").long("title").required(true))
                        .arg(Arg::new("address").long("address"))
                        .arg(Arg::new("memo").long("memo")),
                )
                .subcommand(
                    Command::new("check")
                        .about("Toggle a checklist item")
                        .arg(id_arg("id", "Note id"))
                        .arg(id_arg("item", "Checklist item id")),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a note")
                        .arg(id_arg("id", "Note id")),
                ),
        )
        .subcommand(Command::new("listen").about("Print server events until interrupted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> clap::ArgMatches {
        build_cli()
            .try_get_matches_from(std::iter::once("homenote").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn command_tree_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let matches = parse(&["me", "--api-url", "http://localhost:8080", "-v"]);
        assert_eq!(
            matches.get_one::<String>("api-url").map(String::as_str),
            Some("http://localhost:8080")
        );
        assert!(matches.get_flag("verbose"));
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from(DEFAULT_CONFIG_FILE))
        );
    }

    #[test]
    fn login_parses_provider() {
        let matches = parse(&[
            "login",
            "--provider",
            "Kakao",
            "--code",
            "abc",
            "--redirect-uri",
            "https://app.test/cb",
        ]);
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "login");
        assert_eq!(args.get_one::<AuthProvider>("provider"), Some(&AuthProvider::Kakao));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let result = build_cli().try_get_matches_from([
            "homenote",
            "login",
            "--provider",
            "github",
            "--code",
            "abc",
            "--redirect-uri",
            "x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn contract_submit_takes_many_files() {
        let matches = parse(&["contracts", "submit", "p1.png", "p2.pdf", "--wait"]);
        let (_, contracts) = matches.subcommand().unwrap();
        let (name, submit) = contracts.subcommand().unwrap();
        assert_eq!(name, "submit");
        let files: Vec<&PathBuf> = submit.get_many::<PathBuf>("files").unwrap().collect();
        assert_eq!(files, vec![&PathBuf::from("p1.png"), &PathBuf::from("p2.pdf")]);
        assert!(submit.get_flag("wait"));
    }

    #[test]
    fn search_defaults_page_and_size() {
        let matches = parse(&["listings", "search", "망원동"]);
        let (_, listings) = matches.subcommand().unwrap();
        let (_, search) = listings.subcommand().unwrap();
        assert_eq!(search.get_one::<u32>("page"), Some(&0));
        assert_eq!(search.get_one::<u32>("size"), Some(&20));
        assert_eq!(
            search.get_one::<String>("keyword").map(String::as_str),
            Some("망원동")
        );
    }

    #[test]
    fn checklist_ids_must_be_numbers() {
        let result = build_cli().try_get_matches_from(["homenote", "notes", "check", "3", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn recent_clear_conflicts_with_remove() {
        let result =
            build_cli().try_get_matches_from(["homenote", "recent", "--clear", "--remove", "a"]);
        assert!(result.is_err());
    }
}
