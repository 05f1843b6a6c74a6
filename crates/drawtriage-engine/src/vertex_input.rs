//! Vertex input validation, the last resort when the post-transform
//! geometry itself looks broken: index bounds, attribute fetch
//! arithmetic, zero transform matrices, and degenerate position data.

use tracing::debug;

use drawtriage_replay::{ReplayController, ReplayError};
use drawtriage_state::{PipelineStage, ResourceId, ShaderStage, VertexBufferBinding};

use crate::analysis::Analysis;
use crate::trail::{Flow, ResultStep};

/// Decode raw index buffer bytes at the draw's width, skipping restart
/// indices when restart is enabled.
fn decode_indices(bytes: &[u8], byte_width: u64, restart: Option<u32>) -> Vec<u32> {
    let width = byte_width as usize;
    let mut indices = Vec::with_capacity(bytes.len() / width.max(1));
    for chunk in bytes.chunks_exact(width) {
        let index = match width {
            2 => u32::from(u16::from_le_bytes([chunk[0], chunk[1]])),
            4 => u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
            _ => continue,
        };
        if restart == Some(index) {
            continue;
        }
        indices.push(index);
    }
    indices
}

impl<'r, R: ReplayController> Analysis<'r, R> {
    /// Inspect the vertex inputs for the problems that produce broken
    /// post-transform geometry. Advisories terminate the walk; a clean
    /// pass falls through to the generic conclusion.
    pub(crate) fn validate_vertex_input(&mut self) -> Result<Flow, ReplayError> {
        let mut found = false;

        let max_vertex = self.check_index_bounds(&mut found)?;
        self.check_attribute_fetches(max_vertex, &mut found)?;
        self.check_transform_constants(&mut found)?;
        self.check_position_data(&mut found)?;

        if found {
            return Ok(Flow::Stop);
        }
        self.trail.push(ResultStep::text(
            "I checked the vertex inputs and found no problems with them.",
        ));
        Ok(Flow::Continue)
    }

    /// Highest vertex index the draw fetches (after base vertex), and an
    /// advisory when indices run past the bound index buffer. `None` for
    /// non-indexed draws or unreadable index data.
    fn check_index_bounds(&mut self, found: &mut bool) -> Result<Option<u64>, ReplayError> {
        let draw = self.snapshot.draw;
        if !draw.indexed {
            return Ok(Some(u64::from(draw.num_indices.saturating_sub(1))));
        }
        let Some(binding) = self.snapshot.index_buffer else {
            self.trail.push(
                ResultStep::text(
                    "The draw is indexed but no index buffer is bound, so the fetched \
                     indices are undefined.",
                )
                .with_stage(PipelineStage::VertexInput),
            );
            *found = true;
            return Ok(None);
        };

        let available = self.resolve_buffer_size(binding.resource, binding.byte_size)?;
        let wanted_bytes = (u64::from(draw.first_index) + u64::from(draw.num_indices))
            * binding.index_byte_width;
        if wanted_bytes > available.saturating_sub(binding.byte_offset) {
            self.trail.push(
                ResultStep::text(format!(
                    "The draw reads {} indices starting at index {}, needing {} bytes, \
                     but the bound index buffer only has {} bytes available. Indices \
                     past the end read as garbage or zero.",
                    draw.num_indices,
                    draw.first_index,
                    wanted_bytes,
                    available.saturating_sub(binding.byte_offset)
                ))
                .with_stage(PipelineStage::VertexInput),
            );
            *found = true;
        }

        let offset = binding.byte_offset + u64::from(draw.first_index) * binding.index_byte_width;
        let length = u64::from(draw.num_indices) * binding.index_byte_width;
        let bytes = self.replay.buffer_data(binding.resource, offset, length)?;
        let restart = draw.restart_enabled.then_some(draw.restart_index);
        let indices = decode_indices(&bytes, binding.index_byte_width, restart);
        debug!(count = indices.len(), "decoded index data");
        let Some(&max_index) = indices.iter().max() else {
            return Ok(None);
        };
        let max_vertex = i64::from(max_index) + i64::from(draw.base_vertex);
        if max_vertex < 0 {
            self.trail.push(
                ResultStep::text(format!(
                    "The base vertex of {} pushes the highest index ({max_index}) to a \
                     negative vertex, so every fetch is out of bounds.",
                    draw.base_vertex
                ))
                .with_stage(PipelineStage::VertexInput),
            );
            *found = true;
            return Ok(None);
        }
        Ok(Some(max_vertex as u64))
    }

    /// Per-attribute fetch arithmetic against the resolved size of the
    /// buffer bound to its slot.
    fn check_attribute_fetches(
        &mut self,
        max_vertex: Option<u64>,
        found: &mut bool,
    ) -> Result<(), ReplayError> {
        let Some(max_vertex) = max_vertex else {
            return Ok(());
        };
        let attributes = self.snapshot.vertex_attributes.clone();
        let draw = self.snapshot.draw;
        for attribute in &attributes {
            let Some(binding) = self
                .snapshot
                .vertex_buffers
                .get(attribute.buffer_slot as usize)
                .copied()
            else {
                self.trail.push(
                    ResultStep::text(format!(
                        "Attribute '{}' reads from vertex buffer slot {} but no buffer \
                         is bound there.",
                        attribute.name, attribute.buffer_slot
                    ))
                    .with_stage(PipelineStage::VertexInput),
                );
                *found = true;
                continue;
            };
            if binding.resource.is_null() {
                continue;
            }
            let available = self
                .resolve_buffer_size(binding.resource, binding.byte_size)?
                .saturating_sub(binding.byte_offset);
            let last_element = if attribute.per_instance {
                u64::from(draw.num_instances.saturating_sub(1))
            } else {
                max_vertex
            };
            let needed =
                attribute.byte_offset + binding.byte_stride * last_element + attribute.format.byte_size();
            if needed > available {
                self.trail.push(
                    ResultStep::text(format!(
                        "Attribute '{}' over-reads its vertex buffer: fetching element \
                         {last_element} needs {needed} bytes (offset {} + stride {} x \
                         element + format size {}) but only {available} bytes are bound.",
                        attribute.name,
                        attribute.byte_offset,
                        binding.byte_stride,
                        attribute.format.byte_size()
                    ))
                    .with_stage(PipelineStage::VertexInput),
                );
                *found = true;
            }
        }
        Ok(())
    }

    /// A transform matrix of all zeroes collapses every position to the
    /// origin; it is the most common cause of "everything disappeared".
    fn check_transform_constants(&mut self, found: &mut bool) -> Result<(), ReplayError> {
        let constants = self.replay.constant_variables(ShaderStage::Vertex)?;
        for constant in &constants {
            if !constant.is_matrix() || constant.values.is_empty() {
                continue;
            }
            if constant.values.iter().all(|v| *v == 0.0) {
                self.trail.push(
                    ResultStep::text(format!(
                        "The vertex shader matrix constant '{}' is all zeroes. Any \
                         position transformed by it collapses to the origin.",
                        constant.name
                    ))
                    .with_stage(PipelineStage::VertexShader),
                );
                *found = true;
            }
        }
        Ok(())
    }

    /// Scan the position attribute's raw data for all-identical or
    /// all-zero values, attributing stale contents to the last write.
    fn check_position_data(&mut self, found: &mut bool) -> Result<(), ReplayError> {
        let attributes = self.snapshot.vertex_attributes.clone();
        let Some(position) = attributes.iter().find(|a| {
            let name = a.name.to_ascii_lowercase();
            (name.contains("pos") || name.contains("sv_position")) && !a.per_instance
        }) else {
            return Ok(());
        };
        let Some(binding) = self
            .snapshot
            .vertex_buffers
            .get(position.buffer_slot as usize)
            .copied()
        else {
            return Ok(());
        };
        if binding.resource.is_null() {
            return Ok(());
        }

        let count = u64::from(self.snapshot.draw.num_indices).min(1024);
        let element = position.format.byte_size() as usize;
        let stride = binding.byte_stride.max(position.format.byte_size());
        let bytes = self.replay.buffer_data(
            binding.resource,
            binding.byte_offset + position.byte_offset,
            stride * count,
        )?;

        let mut elements: Vec<&[u8]> = Vec::new();
        let mut cursor = 0usize;
        while cursor + element <= bytes.len() {
            elements.push(&bytes[cursor..cursor + element]);
            cursor += stride as usize;
        }
        if elements.len() < 2 {
            return Ok(());
        }

        let all_zero = elements.iter().all(|e| e.iter().all(|b| *b == 0));
        let all_same = elements.windows(2).all(|pair| pair[0] == pair[1]);
        if !all_zero && !all_same {
            return Ok(());
        }

        let shape = if all_zero {
            "all zeroes"
        } else {
            "identical for every vertex"
        };
        let mut message = format!(
            "The position attribute '{}' is {shape} in the bound vertex buffer, so the \
             draw cannot produce real geometry.",
            position.name
        );
        if let Some(writer) = self.last_buffer_write(binding)? {
            message.push_str(&format!(
                "\n\nThe last write to that buffer before this draw was at {writer}; \
                 check that it wrote what you expected."
            ));
        } else {
            message.push_str(
                "\n\nNo write to that buffer was found earlier in the capture; it may \
                 never have been uploaded.",
            );
        }
        self.trail.push(
            ResultStep::text(message).with_stage(PipelineStage::VertexInput),
        );
        *found = true;
        Ok(())
    }

    fn last_buffer_write(
        &mut self,
        binding: VertexBufferBinding,
    ) -> Result<Option<drawtriage_state::EventId>, ReplayError> {
        let usage = self.replay.usage(binding.resource)?;
        Ok(usage
            .iter()
            .filter(|u| u.usage.writes_contents() && u.event_id < self.eid)
            .map(|u| u.event_id)
            .next_back())
    }

    /// Binding size when recorded, whole-buffer size otherwise.
    fn resolve_buffer_size(
        &mut self,
        resource: ResourceId,
        bound: Option<u64>,
    ) -> Result<u64, ReplayError> {
        if let Some(size) = bound {
            return Ok(size);
        }
        let buffers = self.replay.buffers()?;
        Ok(buffers
            .iter()
            .find(|b| b.resource == resource)
            .map(|b| b.byte_size)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::decode_indices;

    #[test]
    fn decodes_both_index_widths() {
        let bytes = [1u8, 0, 2, 0, 3, 0];
        assert_eq!(decode_indices(&bytes, 2, None), vec![1, 2, 3]);

        let bytes = [5u8, 0, 0, 0, 7, 0, 0, 0];
        assert_eq!(decode_indices(&bytes, 4, None), vec![5, 7]);
    }

    #[test]
    fn restart_indices_are_skipped() {
        let bytes = [1u8, 0, 0xff, 0xff, 2, 0];
        assert_eq!(decode_indices(&bytes, 2, Some(0xffff)), vec![1, 2]);
        // Restart disabled: the sentinel is a real (out of range) index.
        assert_eq!(decode_indices(&bytes, 2, None), vec![1, 0xffff, 2]);
    }
}
