//! Command line options of the batch renderer.

use std::{path::PathBuf, str::FromStr};

use comms::Complex;

use crate::view::View;

pub const USAGE: &str = "\
usage: fractal-farm [options]
  -width N -height N       image size in pixels (64x24)
  -x F -y F                center of the image (-0.5, 0)
  -range F                 width of the image on the real axis (4.0)
  -julia -cx F -cy F       render the Julia set of c = cx + i cy
  -iterations N            iteration limit, also -colours / -colors (250)
  -chunk_width N           chunk size in pixels (32x32)
  -chunk_height N
  -interior                request interior detection
  -workers PATH            worker list (json or one `host [port]` per line)
  -o PATH                  write the graymap to PATH instead of stdout
  -ascii                   force the ASCII graymap format
  -statistics              print per-worker statistics on stderr
  -nooutput                compute but write nothing
  -verbose                 log progress
  -probe                   ask every worker for its process id first
  -version                 print the version and exit";

/// Everything the command line can ask for.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub view: View,
    pub chunk_width: u16,
    pub chunk_height: u16,
    pub workers: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub ascii: bool,
    pub statistics: bool,
    pub nooutput: bool,
    pub verbose: bool,
    pub probe: bool,
    pub version: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            view: View::default(),
            chunk_width: 32,
            chunk_height: 32,
            workers: None,
            output: None,
            ascii: false,
            statistics: false,
            nooutput: false,
            verbose: false,
            probe: false,
            version: false,
        }
    }
}

fn value<T: FromStr>(name: &str, arg: Option<String>) -> Result<T, String> {
    let arg = arg.ok_or_else(|| format!("option -{name} requires an argument"))?;
    arg.parse()
        .map_err(|_| format!("invalid value {arg:?} for -{name}"))
}

impl Options {
    /// Parses the arguments, without the program name.
    ///
    /// # Returns
    /// The options or a message naming the offending argument.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, String> {
        let mut opts = Self::default();
        let mut julia = false;
        let mut c = Complex::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let Some(name) = arg.strip_prefix('-') else {
                return Err(format!("unexpected argument {arg:?}"));
            };

            match name {
                "width" => opts.view.width = value(name, args.next())?,
                "height" => opts.view.height = value(name, args.next())?,
                "x" => opts.view.center.re = value(name, args.next())?,
                "y" => opts.view.center.im = value(name, args.next())?,
                "range" => opts.view.range = value(name, args.next())?,
                "julia" => julia = true,
                "cx" => c.re = value(name, args.next())?,
                "cy" => c.im = value(name, args.next())?,
                "iterations" | "colours" | "colors" => {
                    opts.view.iterations = value(name, args.next())?
                }
                "chunk_width" => opts.chunk_width = value(name, args.next())?,
                "chunk_height" => opts.chunk_height = value(name, args.next())?,
                "interior" => opts.view.interior = true,
                "workers" => opts.workers = Some(value(name, args.next())?),
                "o" => opts.output = Some(value(name, args.next())?),
                "ascii" => opts.ascii = true,
                "statistics" => opts.statistics = true,
                "nooutput" => opts.nooutput = true,
                "verbose" => opts.verbose = true,
                "probe" => opts.probe = true,
                "version" => opts.version = true,
                _ => return Err(format!("unrecognized option {arg:?}")),
            }
        }

        if julia {
            opts.view.julia = Some(c);
        }

        opts.validate()?;
        Ok(opts)
    }

    fn validate(&self) -> Result<(), String> {
        let view = &self.view;

        if view.width == 0 || view.height == 0 {
            return Err("the image must be at least one pixel wide and high".into());
        }

        if self.chunk_width == 0 || self.chunk_height == 0 {
            return Err("chunks must be at least one pixel wide and high".into());
        }

        if view.range.is_nan() || view.range <= 0.0 {
            return Err(format!("the range must be positive, got {}", view.range));
        }

        if view.iterations == 0 || view.iterations > u16::MAX as u32 {
            return Err(format!(
                "the iteration limit must be between 1 and {}",
                u16::MAX
            ));
        }

        let size = view.reply_size(self.chunk_width, self.chunk_height);
        if size > comms::msg::MAX_DATAGRAM {
            return Err(format!(
                "a {}x{} chunk needs a {size} byte reply, more than a datagram holds",
                self.chunk_width, self.chunk_height
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, String> {
        Options::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults() {
        let opts = parse(&[]).unwrap();

        assert_eq!(opts, Options::default());
        assert_eq!((opts.view.width, opts.view.height), (64, 24));
        assert_eq!((opts.chunk_width, opts.chunk_height), (32, 32));
    }

    #[test]
    fn reads_view_and_flags() {
        let opts = parse(&[
            "-width", "320", "-height", "200", "-x", "-0.75", "-y", "0.1", "-range", "0.5",
            "-colours", "1000", "-julia", "-cx", "0.285", "-cy", "0.01", "-o", "out.pgm",
            "-statistics", "-probe",
        ])
        .unwrap();

        assert_eq!(opts.view.width, 320);
        assert_eq!(opts.view.center, Complex::new(-0.75, 0.1));
        assert_eq!(opts.view.range, 0.5);
        assert_eq!(opts.view.iterations, 1000);
        assert_eq!(opts.view.julia, Some(Complex::new(0.285, 0.01)));
        assert_eq!(opts.output, Some(PathBuf::from("out.pgm")));
        assert!(opts.statistics && opts.probe && !opts.nooutput);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["-width"]).is_err());
        assert!(parse(&["-width", "wide"]).is_err());
        assert!(parse(&["-zoom", "2"]).is_err());
        assert!(parse(&["image.pgm"]).is_err());
        assert!(parse(&["-iterations", "70000"]).is_err());
        assert!(parse(&["-range", "0"]).is_err());
    }

    #[test]
    fn rejects_chunks_too_large_for_a_datagram() {
        assert!(parse(&["-chunk_width", "128", "-chunk_height", "64"]).is_err());
        assert!(parse(&["-chunk_width", "128", "-chunk_height", "63"]).is_ok());
        assert!(parse(&["-chunk_width", "64", "-chunk_height", "64", "-iterations", "300"]).is_err());
    }
}
