use assert_cmd::Command;

pub fn manolobot_bin() -> Command {
    #[allow(deprecated)]
    {
        Command::cargo_bin("manolobot").expect("manolobot test binary should build")
    }
}
