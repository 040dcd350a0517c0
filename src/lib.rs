#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # EOL Batch for Rust

 A small batch toolkit converting text files between DOS (`CR LF`) and UNIX
 (`LF`) line endings, in place and one file at a time.

 ## Core Concepts

- **Job:** Represents the entire batch process. A `Job` is composed of one or more `Step`s.
- **Step:** An independent, sequential phase of a job. Steps run a `Tasklet`.
- **Tasklet:** A single unit of work. [`DosToUnixTasklet`](tasklet::dos_to_unix::DosToUnixTasklet)
  converts the files of one or more sources.
- **Transducer:** The streaming byte rewriter behind every conversion, see [`eol::transducer`].

 ## Conversion modes

| **Mode**    | **Behavior**                                                     |
|-------------|------------------------------------------------------------------|
| guess       | Sniffs each file: DOS files become UNIX, anything else becomes DOS |
| dostounix   | Collapses every `CR LF` into `LF`                                |
| unixtodos   | Expands every lone `LF` into `CR LF`                             |

 ## Getting Started

```rust
use eol_batch_rs::{
    core::{
        job::{Job, JobBuilder},
        step::StepBuilder,
    },
    eol::converter::ConversionMode,
    tasklet::dos_to_unix::{DosToUnixTaskletBuilder, SuccessCondition},
    BatchError,
};
use std::fs;

fn main() -> Result<(), BatchError> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("report.txt"), "line 1\r\nline 2\r\n")?;

    let tasklet = DosToUnixTaskletBuilder::new()
        .source_with_mode(dir.path(), Some(r".*\.txt"), ConversionMode::DosToUnix)
        .success_condition(SuccessCondition::NoErrors)
        .build()?;

    let step = StepBuilder::new("to-unix").tasklet(&tasklet).build();
    let job = JobBuilder::new().start(&step).build();
    job.run()?;

    assert_eq!(fs::read(dir.path().join("report.txt"))?, b"line 1\nline 2\n");

    Ok(())
}
```

 ## License
 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.
 */

/// Core module for batch operations
pub mod core;

/// Line ending detection and conversion
pub mod eol;

/// Error types for batch operations
pub mod error;

#[doc(inline)]
pub use error::*;

/// Tasklets for batch steps
pub mod tasklet;
