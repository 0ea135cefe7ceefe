use std::io::Error;

/// What a single invocation does
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Run the digest; a dry run prints instead of mailing and keeps the history as is
    Digest { dry_run: bool },
    /// Only prune expired history entries
    Prune,
}

#[derive(Clone, Debug)]
pub struct CmdArgs {
    pub config: String,
    pub prune: bool,
    pub dry_run: bool,
}

impl CmdArgs {
    pub fn parse(args: Vec<String>) -> Result<Self, Error> {
        let mut config = String::from("./config.json");
        let mut prune = false;
        let mut dry_run = false;
        {
            let mut ap = argparse::ArgumentParser::new();
            ap.set_description("News digest: fetch feeds, summarize the new items and mail them");
            ap.refer(&mut config).add_option(
                &["-c", "--config"],
                argparse::Store,
                "Config file path; default is config.json",
            );
            ap.refer(&mut prune).add_option(
                &["-p", "--prune"],
                argparse::StoreTrue,
                "Prune expired entries from the history file and exit",
            );
            ap.refer(&mut dry_run).add_option(
                &["-d", "--dry-run"],
                argparse::StoreTrue,
                "Print the digest instead of mailing it; the history is not saved",
            );

            match ap.parse(args, &mut std::io::stdout(), &mut std::io::stderr()) {
                Ok(()) => {}
                Err(_) => {
                    return Err(Error::from(std::io::ErrorKind::InvalidInput));
                }
            }
        }

        Ok(CmdArgs {
            config,
            prune,
            dry_run,
        })
    }

    pub fn get_action(&self) -> Operation {
        if self.prune {
            Operation::Prune
        } else {
            Operation::Digest {
                dry_run: self.dry_run,
            }
        }
    }
}
