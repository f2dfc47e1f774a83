use ebb_frame::Abi;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Configurations to print; all of them unless `--target` narrows it.
    pub targets: Vec<Abi>,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgsError {
    #[error("--target expects one of ppc32, ppc64-elfv1, ppc64-elfv2")]
    MissingTarget,
    #[error("unknown target `{0}`; expected ppc32, ppc64-elfv1 or ppc64-elfv2")]
    UnknownTarget(String),
    #[error("unexpected argument `{0}`")]
    Unexpected(String),
}

pub const USAGE: &str = "usage: ebb-layout [--target <ppc32|ppc64-elfv1|ppc64-elfv2>] [--verbose]";

impl Options {
    /// Parses the arguments after the program name.
    pub fn parse<I>(args: I) -> Result<Self, ArgsError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut targets = Vec::new();
        let mut verbose = false;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--verbose" | "-v" => verbose = true,
                "--target" | "-t" => {
                    let name = args.next().ok_or(ArgsError::MissingTarget)?;
                    let abi = Abi::from_name(&name).ok_or(ArgsError::UnknownTarget(name))?;
                    if !targets.contains(&abi) {
                        targets.push(abi);
                    }
                }
                _ => return Err(ArgsError::Unexpected(arg)),
            }
        }

        if targets.is_empty() {
            targets.extend(Abi::ALL);
        }
        Ok(Self { targets, verbose })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, ArgsError> {
        Options::parse(args.iter().map(ToString::to_string))
    }

    #[test]
    fn defaults_to_every_target() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.targets, Abi::ALL);
        assert!(!options.verbose);
    }

    #[test]
    fn target_narrows_the_selection() {
        let options = parse(&["--target", "ppc64-elfv1", "--verbose"]).unwrap();
        assert_eq!(options.targets, [Abi::Ppc64Elfv1]);
        assert!(options.verbose);
    }

    #[test]
    fn bad_arguments_are_reported() {
        assert_eq!(parse(&["--target"]), Err(ArgsError::MissingTarget));
        assert_eq!(
            parse(&["--target", "sparc"]),
            Err(ArgsError::UnknownTarget("sparc".into()))
        );
        assert_eq!(parse(&["--frobnicate"]), Err(ArgsError::Unexpected("--frobnicate".into())));
    }
}
