//! Unit tests for suspend statement annotation

use robosim::annotator::{StepAnnotator, SuspendPoint, SuspendSyntax};

fn annotate(text: &str) -> robosim::Annotation {
    StepAnnotator::new(SuspendSyntax::lua())
        .unwrap()
        .annotate(text)
}

#[cfg(test)]
mod step_annotator_tests {
    use super::*;

    const PROGRAM: &str = "\
local t = 2
function main()
  yield 0.5
  setspeed(10, 10)
  if t > 1 then
    setspeed(0, 0)
      yield t+1
  end
end
";

    #[test]
    fn test_lines_three_and_seven() {
        let out = annotate(PROGRAM);
        let original: Vec<&str> = PROGRAM.lines().collect();
        let rewritten: Vec<&str> = out.source.lines().collect();

        assert_eq!(rewritten.len(), original.len());
        assert_eq!(rewritten[2], "  coroutine.yield(3, 0.5)");
        assert_eq!(rewritten[6], "      coroutine.yield(7, t+1)");
        for (i, (before, after)) in original.iter().zip(&rewritten).enumerate() {
            if i != 2 && i != 6 {
                assert_eq!(before, after, "line {} changed", i + 1);
            }
        }
        assert!(out.source.ends_with('\n'));
    }

    #[test]
    fn test_suspend_points_are_reported_in_order() {
        let out = annotate(PROGRAM);
        assert_eq!(
            out.suspend_points,
            vec![
                SuspendPoint {
                    line_number: 3,
                    raw_duration_expression: "0.5".to_string(),
                },
                SuspendPoint {
                    line_number: 7,
                    raw_duration_expression: "t+1".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_tab_indentation_is_preserved() {
        let out = annotate("function main()\n\tyield 1\nend");
        assert_eq!(out.source, "function main()\n\tcoroutine.yield(2, 1)\nend");
    }

    #[test]
    fn test_same_expression_on_many_lines() {
        let out = annotate("yield 1\nyield 1\nx()\nyield 1\n");
        let lines: Vec<usize> = out.suspend_points.iter().map(|p| p.line_number).collect();
        assert_eq!(lines, vec![1, 2, 4]);
        assert_eq!(
            out.source,
            "coroutine.yield(1, 1)\ncoroutine.yield(2, 1)\nx()\ncoroutine.yield(4, 1)\n"
        );
    }

    #[test]
    fn test_malformed_statements_do_not_shift_numbering() {
        let out = annotate("yield\nyield -- later\nyield 2\n");
        assert_eq!(out.suspend_points.len(), 1);
        assert_eq!(out.suspend_points[0].line_number, 3);
        assert_eq!(out.source, "yield\nyield -- later\ncoroutine.yield(3, 2)\n");
    }

    #[test]
    fn test_expression_with_call_and_comment() {
        let out = annotate("  yield math.max(1, t) -- at least a second\n");
        assert_eq!(
            out.source,
            "  coroutine.yield(1, math.max(1, t)) -- at least a second\n"
        );
        assert_eq!(out.suspend_points[0].raw_duration_expression, "math.max(1, t)");
    }

    #[test]
    fn test_keyword_inside_other_code_is_untouched() {
        let text = "local yielded = 1\n-- yield 5\nfoo(yield)\n";
        let out = annotate(text);
        assert_eq!(out.source, text);
        assert!(out.suspend_points.is_empty());
    }

    #[test]
    fn test_empty_text() {
        let out = annotate("");
        assert_eq!(out.source, "");
        assert!(out.suspend_points.is_empty());
    }

    #[test]
    fn test_annotator_reports_its_syntax() {
        let syntax = SuspendSyntax::lua().with_keyword("wait");
        let annotator = StepAnnotator::new(syntax.clone()).unwrap();
        assert_eq!(annotator.syntax(), &syntax);
        assert_eq!(
            annotator.annotate("wait 3\n").source,
            "coroutine.yield(1, 3)\n"
        );
    }
}
