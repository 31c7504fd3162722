//! The command loop: literals, distances and back-reference copies.
//!
//! Each method runs one state of the decoder and returns the next. Loops that
//! can stop half way keep their progress in the state they return, so a
//! suspended call resumes at the exact byte it stopped on.

use crate::decompress::{Decoder, Resume, RunningState};
use crate::error::{DecodeError, Halt};
use crate::huffman::read_symbol;
use crate::metablock::{MAX_ALLOWED_DISTANCE, NUM_DISTANCE_SHORT_CODES};
use crate::prefix::{COMMAND_LOOKUP, DISTANCE_SHORT_CODE_INDEX_OFFSET, DISTANCE_SHORT_CODE_VALUE_OFFSET};
use crate::source::ByteSource;
use crate::transform::{self, transform_dictionary_word};
use crate::{compound::CopyCursor, dictionary};

type Step<T> = core::result::Result<T, Halt>;

impl<S: ByteSource> Decoder<S> {
    pub(crate) fn read_command(&mut self) -> Step<RunningState> {
        if self.meta_len == 0 {
            return Ok(RunningState::BlockStart);
        }
        self.bits.ensure_input()?;
        if self.block.command_switch.remaining == 0 {
            self.block.switch_command_block(&mut self.bits);
        }
        self.block.command_switch.remaining -= 1;

        self.bits.fill_bit_window();
        let command = COMMAND_LOOKUP[read_symbol(self.block.command_tree(), &mut self.bits) as usize];
        self.insert_len =
            command.insert_offset as usize + self.bits.read_bits(command.insert_extra_bits.into()) as usize;
        self.copy_len =
            command.copy_offset as usize + self.bits.read_bits(command.copy_extra_bits.into()) as usize;
        self.distance_context = command.distance_context;

        if self.insert_len > self.meta_len {
            return Err(DecodeError::CorruptMetablockLength.into());
        }
        Ok(RunningState::InsertLoop { inserted: 0 })
    }

    pub(crate) fn insert_literals(&mut self, mut inserted: usize, fence: usize) -> Step<RunningState> {
        while inserted < self.insert_len {
            self.state = RunningState::InsertLoop { inserted };
            self.bits.ensure_input()?;
            if self.block.literal_switch.remaining == 0 {
                self.block.switch_literal_block(&mut self.bits);
            }
            self.block.literal_switch.remaining -= 1;

            let tree = if self.block.trivial_literal_context {
                self.block.literal_tree
            } else {
                self.block.literal_tree_for(self.ring.byte_before(1), self.ring.byte_before(2))
            };
            self.bits.fill_bit_window();
            let literal = read_symbol(self.block.literal_trees.tree(tree), &mut self.bits);
            self.ring.buffer[self.ring.pos] = literal as u8;
            self.ring.pos += 1;
            self.meta_len -= 1;
            inserted += 1;
            if self.ring.pos >= fence {
                return Ok(RunningState::Write(Resume::InsertLoop { inserted }));
            }
        }
        if self.meta_len == 0 {
            return Ok(RunningState::MainLoop);
        }
        Ok(RunningState::ReadDistance)
    }

    pub(crate) fn read_distance(&mut self) -> Step<RunningState> {
        let mut explicit_code = 0;
        if let Ok(context) = usize::try_from(self.distance_context) {
            self.bits.ensure_input()?;
            if self.block.distance_switch.remaining == 0 {
                self.block.switch_distance_block(&mut self.bits);
            }
            self.block.distance_switch.remaining -= 1;

            self.bits.fill_bit_window();
            let code = read_symbol(self.block.distance_tree(context), &mut self.bits) as usize;
            self.distance = if code < NUM_DISTANCE_SHORT_CODES {
                let index = (self.distance_index + DISTANCE_SHORT_CODE_INDEX_OFFSET[code]) & 3;
                self.distances[index]
                    .checked_add_signed(DISTANCE_SHORT_CODE_VALUE_OFFSET[code])
                    .filter(|&distance| distance > 0)
                    .ok_or(DecodeError::InvalidDistance)?
            } else {
                let extra = self.bits.read_bits(self.block.dist_extra_bits[code].into()) as usize;
                self.block.dist_offset[code] + (extra << self.block.distance_postfix_bits)
            };
            explicit_code = code;
        } else {
            self.distance = self.distances[self.distance_index];
        }

        if self.max_distance != self.max_backward_distance && self.ring.pos < self.max_backward_distance {
            self.max_distance = self.ring.pos;
        } else {
            self.max_distance = self.max_backward_distance;
        }
        if self.distance > self.max_distance {
            return Ok(RunningState::UseDictionary);
        }

        if explicit_code > 0 {
            self.push_distance(self.distance);
        }
        if self.copy_len > self.meta_len {
            return Err(DecodeError::CopyLengthExceedsBlock.into());
        }
        Ok(RunningState::CopyLoop { copied: 0 })
    }

    /// Copies from `distance` bytes back in the window.
    pub(crate) fn copy_backward(&mut self, mut copied: usize, fence: usize) -> RunningState {
        let mask = self.ring.mask();
        let remaining = self.copy_len - copied;
        let src = self.ring.pos.wrapping_sub(self.distance) & mask;
        let dst = self.ring.pos;

        if src + remaining < mask && dst + remaining < mask {
            let buffer = &mut self.ring.buffer;
            if src + remaining <= dst || dst + remaining <= src {
                buffer.copy_within(src..src + remaining, dst);
            } else {
                // Overlapping ranges repeat the pattern, so copy front to back.
                let mut k = 0;
                while k + 4 <= remaining {
                    buffer[dst + k] = buffer[src + k];
                    buffer[dst + k + 1] = buffer[src + k + 1];
                    buffer[dst + k + 2] = buffer[src + k + 2];
                    buffer[dst + k + 3] = buffer[src + k + 3];
                    k += 4;
                }
                for k in k..remaining {
                    buffer[dst + k] = buffer[src + k];
                }
            }
            self.ring.pos += remaining;
            self.meta_len -= remaining;
            if self.ring.pos >= fence {
                return RunningState::Write(Resume::MainLoop);
            }
            return RunningState::MainLoop;
        }

        while copied < self.copy_len {
            let byte = self.ring.buffer[self.ring.pos.wrapping_sub(self.distance) & mask];
            self.ring.buffer[self.ring.pos] = byte;
            self.ring.pos += 1;
            self.meta_len -= 1;
            copied += 1;
            if self.ring.pos >= fence {
                return RunningState::Write(Resume::CopyLoop { copied });
            }
        }
        RunningState::MainLoop
    }

    /// Resolves a distance past the window against the compound dictionary,
    /// then the static one.
    pub(crate) fn use_dictionary(&mut self, fence: usize) -> Step<RunningState> {
        if self.distance > MAX_ALLOWED_DISTANCE {
            return Err(DecodeError::InvalidDistance.into());
        }
        let beyond = self.distance - self.max_distance - 1;
        let compound_size = self.compound.total_size();

        if beyond < compound_size {
            if self.copy_len > self.meta_len {
                return Err(DecodeError::CopyLengthExceedsBlock.into());
            }
            let address = compound_size - 1 - beyond;
            let cursor = self.compound.start_copy(address, self.copy_len)?;
            self.push_distance(self.distance);
            self.meta_len -= self.copy_len;
            return Ok(RunningState::CompoundDictionaryCopy(cursor));
        }

        // Only the transformed length has to fit; omit transforms shorten the word.
        let (word, transform_index) = dictionary::lookup(self.copy_len, beyond - compound_size)?;
        let transform = transform::builtin(transform_index).ok_or(DecodeError::DictionaryAddressOutOfRange)?;
        let pos = self.ring.pos;
        let len = transform_dictionary_word(&mut self.ring.buffer[pos..], word, &transform);
        if len > self.meta_len {
            return Err(DecodeError::CopyLengthExceedsBlock.into());
        }
        self.ring.pos += len;
        self.meta_len -= len;
        if self.ring.pos >= fence {
            return Ok(RunningState::Write(Resume::MainLoop));
        }
        Ok(RunningState::MainLoop)
    }

    pub(crate) fn copy_from_compound(&mut self, mut cursor: CopyCursor, fence: usize) -> RunningState {
        let pos = self.ring.pos;
        let end = fence.max(pos);
        self.ring.pos += self.compound.copy(&mut cursor, &mut self.ring.buffer[pos..end]);
        if !cursor.is_done() {
            return RunningState::Write(Resume::CompoundDictionaryCopy(cursor));
        }
        if self.ring.pos >= fence {
            return RunningState::Write(Resume::MainLoop);
        }
        RunningState::MainLoop
    }
}
